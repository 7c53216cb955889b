//! MySQL and MariaDB driver (sqlx)

use chrono::NaiveDateTime;
use clockwork_api::Connection;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, Row};
use std::time::Duration;

use crate::error::{connect_error, query_error};
use crate::query::{decode_punches, user_summary, RawPunch, RowShape};
use crate::{EngineResult, QueryRows, RenderedQuery, SqlParam};

const MAX_CONNECTIONS: u32 = 4;

pub struct MySqlDriver {
    pool: MySqlPool,
}

impl MySqlDriver {
    pub async fn connect(conn: &Connection, port: u16, timeout: Duration) -> EngineResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(conn.host.as_deref().unwrap_or_default())
            .port(port)
            .database(conn.db_name.as_deref().unwrap_or_default())
            .charset("utf8mb4");
        if let Some(user) = &conn.user {
            options = options.username(user);
        }
        if let Some(password) = &conn.password {
            options = options.password(password);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await
            .map_err(connect_error)?;

        Ok(Self { pool })
    }

    pub async fn ping(&self) -> EngineResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    pub(crate) async fn query(&self, rendered: RenderedQuery, shape: RowShape) -> EngineResult<QueryRows> {
        let rows = bind_all(sqlx::query(&rendered.sql), &rendered.params)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        match shape {
            RowShape::Punch => {
                let raw = rows.iter().map(raw_punch).collect::<Result<Vec<_>, _>>().map_err(query_error)?;
                Ok(QueryRows::Punches(decode_punches(raw)?))
            }
            RowShape::User => {
                let users = rows
                    .iter()
                    .map(|row| Ok(user_summary(row.try_get(0)?, row.try_get(1)?, row.try_get(2)?)))
                    .collect::<Result<Vec<_>, sqlx::Error>>()
                    .map_err(query_error)?;
                Ok(QueryRows::Users(users))
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlParam],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Text(s) => query.bind(s.clone()),
            SqlParam::Timestamp(t) => query.bind(*t),
        };
    }
    query
}

fn raw_punch(row: &MySqlRow) -> Result<RawPunch, sqlx::Error> {
    Ok(RawPunch {
        user_id: row.try_get(0)?,
        username: row.try_get(1)?,
        full_name: row.try_get(2)?,
        punched_at: row.try_get::<NaiveDateTime, _>(3)?,
        direction: row.try_get::<Option<String>, _>(4)?.unwrap_or_default(),
    })
}
