//! SQL rendering per engine
//!
//! Every engine-specific detail of the generated SQL lives here: identifier
//! quoting, placeholder syntax, casts that pin result column types, and how
//! timestamps are compared.

use clockwork_api::{EngineKind, SourceSchema};

use crate::{QuerySpec, SqlParam};

/// Escape character for LIKE patterns; valid in every supported engine
const LIKE_ESCAPE: char = '!';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// MySQL and MariaDB
    MySql,
    Postgres,
    Sqlite,
}

/// SQL text plus its bind parameters, in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Dialect {
    pub fn for_engine(kind: EngineKind) -> Self {
        match kind {
            EngineKind::Mysql | EngineKind::Mariadb => Self::MySql,
            EngineKind::Postgres => Self::Postgres,
            EngineKind::Sqlite => Self::Sqlite,
        }
    }

    /// Quote a plain or dotted identifier, one segment at a time
    pub fn quote_ident(&self, ident: &str) -> String {
        let (open, close) = match self {
            Self::MySql => ('`', '`'),
            Self::Postgres | Self::Sqlite => ('"', '"'),
        };
        ident
            .split('.')
            .map(|part| {
                let escaped = part.replace(close, &format!("{close}{close}"));
                format!("{open}{escaped}{close}")
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn placeholder(&self, n: usize) -> String {
        match self {
            Self::MySql => "?".to_string(),
            Self::Postgres => format!("${}", n),
            Self::Sqlite => format!("?{}", n),
        }
    }

    fn cast_int(&self, expr: &str) -> String {
        match self {
            Self::MySql => format!("CAST({} AS SIGNED)", expr),
            Self::Postgres => format!("CAST({} AS BIGINT)", expr),
            Self::Sqlite => format!("CAST({} AS INTEGER)", expr),
        }
    }

    fn cast_text(&self, expr: &str) -> String {
        match self {
            Self::MySql => format!("CAST({} AS CHAR)", expr),
            Self::Postgres | Self::Sqlite => format!("CAST({} AS TEXT)", expr),
        }
    }

    /// Expression used when comparing timestamps. SQLite stores them as
    /// text in more than one layout, so both sides go through `julianday`,
    /// which keeps milliseconds.
    fn time_cmp(&self, expr: &str) -> String {
        match self {
            Self::Sqlite => format!("julianday({})", expr),
            Self::MySql | Self::Postgres => expr.to_string(),
        }
    }

    fn like(&self, expr: &str, placeholder: &str) -> String {
        match self {
            Self::Postgres => format!("{} ILIKE {} ESCAPE '{}'", expr, placeholder, LIKE_ESCAPE),
            Self::MySql | Self::Sqlite => {
                format!("LOWER({}) LIKE {} ESCAPE '{}'", expr, placeholder, LIKE_ESCAPE)
            }
        }
    }

    /// Render a canonical query against the configured source tables
    pub fn render(&self, spec: &QuerySpec, schema: &SourceSchema) -> RenderedQuery {
        let mut binder = Binder::new(*self);
        let sql = match spec {
            QuerySpec::Punches {
                user_ids,
                start_utc,
                end_utc,
            } => {
                let cols = Columns::new(*self, schema);
                let ids = user_ids
                    .iter()
                    .map(|id| binder.bind(SqlParam::Int(id.get())))
                    .collect::<Vec<_>>()
                    .join(", ");
                let start = self.time_cmp(&binder.bind(SqlParam::Timestamp(start_utc.naive_utc())));
                let end = self.time_cmp(&binder.bind(SqlParam::Timestamp(end_utc.naive_utc())));
                let time = self.time_cmp(&cols.p_time);

                format!(
                    "{} WHERE {} IN ({}) AND {} >= {} AND {} < {} ORDER BY {}, {}",
                    cols.punch_select(),
                    cols.p_user,
                    ids,
                    time,
                    start,
                    time,
                    end,
                    cols.p_user,
                    time
                )
            }
            QuerySpec::LatestPunches { before_utc } => {
                let cols = Columns::new(*self, schema);
                let before = self.time_cmp(&binder.bind(SqlParam::Timestamp(before_utc.naive_utc())));
                let inner_user = format!("p2.{}", self.quote_ident(&schema.punch_user_column));
                let inner_time = self.time_cmp(&format!(
                    "p2.{}",
                    self.quote_ident(&schema.punch_time_column)
                ));

                format!(
                    "{} WHERE {} = (SELECT MAX({}) FROM {} p2 WHERE {} = {} AND {} < {}) ORDER BY {}",
                    cols.punch_select(),
                    self.time_cmp(&cols.p_time),
                    inner_time,
                    self.quote_ident(&schema.punches_table),
                    inner_user,
                    cols.p_user,
                    inner_time,
                    before,
                    cols.p_user
                )
            }
            QuerySpec::Users {
                search,
                limit,
                offset,
            } => {
                let id = format!("u.{}", self.quote_ident(&schema.user_id_column));
                let username = format!("u.{}", self.quote_ident(&schema.username_column));
                let full_name = format!("u.{}", self.quote_ident(&schema.full_name_column));

                let mut sql = format!(
                    "SELECT {}, {}, {} FROM {} u",
                    self.cast_int(&id),
                    self.cast_text(&username),
                    self.cast_text(&full_name),
                    self.quote_ident(&schema.users_table)
                );

                if let Some(term) = search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                    let pattern = like_pattern(term);
                    let by_username = binder.bind(SqlParam::Text(pattern.clone()));
                    let by_name = binder.bind(SqlParam::Text(pattern));
                    sql.push_str(&format!(
                        " WHERE {} OR {}",
                        self.like(&username, &by_username),
                        self.like(&full_name, &by_name)
                    ));
                }

                let limit = binder.bind(SqlParam::Int(i64::from(*limit)));
                let offset = binder.bind(SqlParam::Int(i64::from(*offset)));
                sql.push_str(&format!(
                    " ORDER BY {}, {} LIMIT {} OFFSET {}",
                    username, id, limit, offset
                ));
                sql
            }
        };

        RenderedQuery {
            sql,
            params: binder.params,
        }
    }
}

/// Hands out placeholders in bind order
struct Binder {
    dialect: Dialect,
    params: Vec<SqlParam>,
}

impl Binder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        self.dialect.placeholder(self.params.len())
    }
}

/// Quoted column references for the punch join
struct Columns {
    dialect: Dialect,
    p_user: String,
    p_time: String,
    p_direction: String,
    u_id: String,
    u_username: String,
    u_full_name: String,
    punches: String,
    users: String,
}

impl Columns {
    fn new(dialect: Dialect, schema: &SourceSchema) -> Self {
        let q = |ident: &str| dialect.quote_ident(ident);
        Self {
            dialect,
            p_user: format!("p.{}", q(&schema.punch_user_column)),
            p_time: format!("p.{}", q(&schema.punch_time_column)),
            p_direction: format!("p.{}", q(&schema.punch_direction_column)),
            u_id: format!("u.{}", q(&schema.user_id_column)),
            u_username: format!("u.{}", q(&schema.username_column)),
            u_full_name: format!("u.{}", q(&schema.full_name_column)),
            punches: q(&schema.punches_table),
            users: q(&schema.users_table),
        }
    }

    /// user_id, username, full_name, punched_at, direction
    fn punch_select(&self) -> String {
        let d = self.dialect;
        format!(
            "SELECT {}, {}, {}, {}, {} FROM {} p LEFT JOIN {} u ON {} = {}",
            d.cast_int(&self.p_user),
            d.cast_text(&self.u_username),
            d.cast_text(&self.u_full_name),
            self.p_time,
            d.cast_text(&self.p_direction),
            self.punches,
            self.users,
            self.u_id,
            self.p_user
        )
    }
}

/// Lower-cased `%term%` with LIKE wildcards escaped
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clockwork_util::UserId;

    fn punches_spec() -> QuerySpec {
        QuerySpec::Punches {
            user_ids: vec![UserId::new(3), UserId::new(9)],
            start_utc: Utc.with_ymd_and_hms(2024, 2, 29, 20, 30, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2024, 3, 31, 20, 30, 0).unwrap(),
        }
    }

    #[test]
    fn quoting() {
        assert_eq!(Dialect::MySql.quote_ident("hr.punches"), "`hr`.`punches`");
        assert_eq!(Dialect::Postgres.quote_ident("Punches"), "\"Punches\"");
        assert_eq!(Dialect::Sqlite.quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn mysql_punches() {
        let q = Dialect::MySql.render(&punches_spec(), &SourceSchema::default());
        assert!(q.sql.contains("FROM `attendance_punches` p LEFT JOIN `employees` u"));
        assert!(q.sql.contains("p.`user_id` IN (?, ?)"));
        assert!(q.sql.contains("p.`punched_at_utc` >= ? AND p.`punched_at_utc` < ?"));
        assert!(q.sql.contains("CAST(p.`user_id` AS SIGNED)"));
        assert_eq!(q.params.len(), 4);
        assert_eq!(q.params[0], SqlParam::Int(3));
        assert!(matches!(&q.params[2], SqlParam::Timestamp(t) if t.to_string() == "2024-02-29 20:30:00"));
    }

    #[test]
    fn postgres_punches_number_placeholders() {
        let q = Dialect::Postgres.render(&punches_spec(), &SourceSchema::default());
        assert!(q.sql.contains("p.\"user_id\" IN ($1, $2)"));
        assert!(q.sql.contains(">= $3"));
        assert!(q.sql.contains("< $4"));
        assert!(q.sql.contains("CAST(u.\"username\" AS TEXT)"));
    }

    #[test]
    fn sqlite_normalizes_text_timestamps() {
        let q = Dialect::Sqlite.render(&punches_spec(), &SourceSchema::default());
        assert!(q.sql.contains("julianday(p.\"punched_at_utc\") >= julianday(?3)"));
        assert!(q.sql.contains("julianday(p.\"punched_at_utc\") < julianday(?4)"));
        assert!(q.sql.contains("IN (?1, ?2)"));
    }

    #[test]
    fn sqlite_latest_compares_with_milliseconds() {
        let spec = QuerySpec::LatestPunches {
            before_utc: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        };
        let q = Dialect::Sqlite.render(&spec, &SourceSchema::default());
        assert!(q.sql.contains(
            "julianday(p.\"punched_at_utc\") = (SELECT MAX(julianday(p2.\"punched_at_utc\")) FROM \"attendance_punches\" p2 WHERE p2.\"user_id\" = p.\"user_id\" AND julianday(p2.\"punched_at_utc\") < julianday(?1))"
        ));
        assert!(!q.sql.contains("datetime("));
    }

    #[test]
    fn latest_punches_correlates_on_user() {
        let spec = QuerySpec::LatestPunches {
            before_utc: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        };
        let q = Dialect::Postgres.render(&spec, &SourceSchema::default());
        assert!(q.sql.contains(
            "p.\"punched_at_utc\" = (SELECT MAX(p2.\"punched_at_utc\") FROM \"attendance_punches\" p2 WHERE p2.\"user_id\" = p.\"user_id\" AND p2.\"punched_at_utc\" < $1)"
        ));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn users_search() {
        let spec = QuerySpec::Users {
            search: Some("50%_Off".into()),
            limit: 20,
            offset: 40,
        };
        let pg = Dialect::Postgres.render(&spec, &SourceSchema::default());
        assert!(pg.sql.contains("u.\"username\" ILIKE $1 ESCAPE '!'"));
        assert!(pg.sql.ends_with("LIMIT $3 OFFSET $4"));
        assert_eq!(pg.params[0], SqlParam::Text("%50!%!_off%".into()));
        assert_eq!(pg.params[2], SqlParam::Int(20));

        let my = Dialect::MySql.render(&spec, &SourceSchema::default());
        assert!(my.sql.contains("LOWER(u.`full_name`) LIKE ? ESCAPE '!'"));
    }

    #[test]
    fn users_without_search() {
        let spec = QuerySpec::Users {
            search: Some("   ".into()),
            limit: 50,
            offset: 0,
        };
        let q = Dialect::Sqlite.render(&spec, &SourceSchema::default());
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.contains("LIMIT ?1 OFFSET ?2"));
    }

    #[test]
    fn custom_source_names() {
        let schema = SourceSchema {
            punches_table: "hr.punch_log".into(),
            punch_time_column: "logged_at".into(),
            ..SourceSchema::default()
        };
        let q = Dialect::Postgres.render(&punches_spec(), &schema);
        assert!(q.sql.contains("FROM \"hr\".\"punch_log\" p"));
        assert!(q.sql.contains("p.\"logged_at\" >= $3"));
    }
}
