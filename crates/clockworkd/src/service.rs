//! Service state and request dispatch

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clockwork_api::{
    Command, Connection, ConnectionPhase, EngineKind, ErrorInfo, Event, EventPayload, HealthStatus,
    Response, ResponsePayload, Settings,
};
use clockwork_config::{validate_settings, AppConfig};
use clockwork_core::{
    build_report, current_presence, presence_as_of, AttendanceQueries, CalendarPolicy,
    ConnectionManager, ConnectionStatus, Exporter, QueryContext, ReportFormatter,
};
use clockwork_ipc::{IpcServer, ServerMessage};
use clockwork_store::{ExportHistoryStore, SqliteHistoryStore};
use clockwork_util::{local_day, ClientId, ClockworkError, ClockworkResult};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

/// Everything a request handler needs
pub struct Service {
    manager: Arc<ConnectionManager>,
    queries: AttendanceQueries,
    exporter: Exporter,
    store: Arc<dyn ExportHistoryStore>,
    settings: RwLock<Settings>,
    events: broadcast::Sender<Event>,
}

impl Service {
    pub fn new(config: &AppConfig, store: Arc<dyn ExportHistoryStore>) -> Self {
        let manager = Arc::new(ConnectionManager::new(config.source.clone()));
        let (events, _) = broadcast::channel(100);

        Self {
            queries: AttendanceQueries::new(Arc::clone(&manager)),
            exporter: Exporter::new(Arc::clone(&store)),
            manager,
            store,
            settings: RwLock::new(config.settings.clone()),
            events,
        }
    }

    /// Service backed by the export history database in `data_dir`
    pub fn open(config: &AppConfig, data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("clockworkd.db");
        let store: Arc<dyn ExportHistoryStore> = Arc::new(
            SqliteHistoryStore::open(&db_path)
                .with_context(|| format!("Failed to open export history {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        Ok(Self::new(config, store))
    }

    /// Install an export formatter (e.g. an external PDF renderer)
    pub fn register_formatter(&mut self, formatter: Arc<dyn ReportFormatter>) {
        self.exporter.register(formatter);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Open the startup connection, if any. Failure is logged, not fatal.
    pub async fn connect_at_startup(&self, connection: Option<Connection>) {
        let Some(connection) = connection else {
            info!("No startup connection configured");
            return;
        };

        let timeout = self.settings().await.query_timeout();
        match self.manager.set_connection(&connection, timeout).await {
            Ok(engine) => info!(engine = %engine, target = %connection.describe(), "Startup connection ready"),
            Err(e) => warn!(error = %e, "Startup connection failed, waiting for a connect request"),
        }
    }

    pub async fn handle_command(&self, client_id: &ClientId, request_id: u64, command: Command) -> Response {
        let name = command_name(&command);
        match self.execute(client_id, command).await {
            Ok(payload) => Response::success(request_id, payload),
            Err(e) => {
                let info = ErrorInfo::from(&e);
                warn!(command = name, code = ?info.code, error = %e, "Request failed");
                Response::error(request_id, info)
            }
        }
    }

    async fn execute(&self, client_id: &ClientId, command: Command) -> ClockworkResult<ResponsePayload> {
        match command {
            Command::GetHealth => Ok(ResponsePayload::Health(self.health().await)),

            Command::Connect { connection } => {
                let timeout = self.settings().await.query_timeout();
                let before = self.manager.status();
                let result = self.manager.set_connection(&connection, timeout).await;
                self.emit_connection_change(&before);

                let engine = result?;
                Ok(connected_reply(engine, self.manager.ping(timeout).await))
            }

            Command::Disconnect => {
                let before = self.manager.status();
                self.manager.close().await;
                self.emit_connection_change(&before);
                Ok(ResponsePayload::Disconnected)
            }

            Command::GetSettings => Ok(ResponsePayload::Settings(self.settings().await)),

            Command::UpdateSettings { settings } => {
                let errors = validate_settings(&settings);
                if !errors.is_empty() {
                    let message = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
                    return Err(ClockworkError::validation(message));
                }
                *self.settings.write().await = settings.clone();
                info!(
                    utc_offset = %settings.utc_offset,
                    payroll_cycle_start_day = settings.payroll_cycle_start_day,
                    "Settings updated"
                );
                Ok(ResponsePayload::Settings(settings))
            }

            Command::ListUsers { query, limit, offset } => {
                let settings = self.settings().await;
                let ctx = QueryContext::from_settings(&settings)?;
                let search = query.as_deref().map(str::trim).filter(|q| !q.is_empty());
                let users = self
                    .queries
                    .list_users(search, settings.page_size(limit), offset.unwrap_or(0), &ctx)
                    .await?;
                Ok(ResponsePayload::Users { users })
            }

            Command::BuildReport { user_ids, date_range } => {
                if user_ids.is_empty() {
                    return Err(ClockworkError::EmptySelection);
                }
                let settings = self.settings().await;
                let ctx = QueryContext::from_settings(&settings)?;
                let policy = CalendarPolicy::new(settings.payroll_cycle_start_day);
                let today = local_day(&clockwork_util::now().with_timezone(&Utc), &ctx.zone);
                let range = policy.resolve_range(&date_range, today)?;

                let punches = self.queries.fetch_punches(&user_ids, range.from, range.to, &ctx).await?;
                let directory = self.queries.users_by_id(&user_ids, &ctx).await?;
                let report = build_report(&punches, &directory, range, &ctx.zone);

                info!(
                    users = user_ids.len(),
                    from = %range.from,
                    to = %range.to,
                    rows = report.totals.records,
                    hours = report.totals.hours,
                    "Report built"
                );
                Ok(ResponsePayload::Report(report))
            }

            Command::GetPresence { date } => {
                let ctx = QueryContext::from_settings(&self.settings().await)?;
                let now = clockwork_util::now().with_timezone(&Utc);
                let as_of = presence_as_of(date, now, &ctx.zone)?;
                let latest = self.queries.latest_punches(as_of, &ctx).await?;
                let entries = current_presence(&latest, as_of);

                debug!(as_of = %as_of, present = entries.len(), "Presence computed");
                Ok(ResponsePayload::Presence {
                    as_of: as_of.with_timezone(&Local),
                    entries,
                })
            }

            Command::Export { format, payload, meta, save_path } => {
                let outcome = self.exporter.export(format, &payload, &meta, &save_path).await?;
                self.emit(EventPayload::ExportRecorded {
                    item: outcome.item.clone(),
                });
                Ok(ResponsePayload::Exported(outcome))
            }

            Command::ListExports => Ok(ResponsePayload::Exports {
                items: self.store.list()?,
            }),

            Command::DeleteExports { ids } => {
                let items = self.store.delete_many(&ids)?;
                self.emit(EventPayload::HistoryChanged { remaining: items.len() });
                Ok(ResponsePayload::Exports { items })
            }

            Command::ClearExports => {
                let removed = self.store.clear()?;
                info!(removed = removed.len(), "Export history cleared");
                self.emit(EventPayload::HistoryChanged { remaining: 0 });
                Ok(ResponsePayload::Exports { items: Vec::new() })
            }

            Command::SubscribeEvents => Ok(ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            }),

            Command::UnsubscribeEvents => Ok(ResponsePayload::Unsubscribed),

            Command::Ping => Ok(ResponsePayload::Pong),
        }
    }

    async fn health(&self) -> HealthStatus {
        let status = self.manager.status();
        let mut last_error = status.last_error.clone();

        let latency_ms = if status.phase == ConnectionPhase::Connected {
            let timeout = self.settings().await.query_timeout();
            match self.manager.ping(timeout).await {
                Ok(latency) => Some(latency.as_millis() as u64),
                Err(e) => {
                    last_error = Some(e.to_string());
                    None
                }
            }
        } else {
            None
        };

        HealthStatus {
            live: true,
            phase: status.phase,
            engine: status.engine,
            latency_ms,
            store_ok: self.store.is_healthy(),
            last_error,
        }
    }

    fn emit(&self, payload: EventPayload) {
        // No receivers is fine
        let _ = self.events.send(Event::new(payload));
    }

    fn emit_connection_change(&self, before: &ConnectionStatus) {
        let after = self.manager.status();
        if after.phase != before.phase || after.generation != before.generation || after.engine != before.engine {
            self.emit(EventPayload::ConnectionChanged {
                phase: after.phase,
                engine: after.engine,
            });
        }
    }

    /// Serve IPC requests until `shutdown` resolves.
    ///
    /// Each request runs on its own task so a slow report does not hold up
    /// pings or exports from other clients.
    pub async fn run(self: Arc<Self>, ipc: Arc<IpcServer>, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let accept = Arc::clone(&ipc);
        tokio::spawn(async move {
            if let Err(e) = accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut events = self.subscribe();
        let forward = Arc::clone(&ipc);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => forward.broadcast_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event forwarder lagging");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        tokio::pin!(shutdown);
        info!("Service running");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                msg = messages.recv() => match msg {
                    Some(ServerMessage::Request { client_id, request }) => {
                        let service = Arc::clone(&self);
                        let ipc = Arc::clone(&ipc);
                        tokio::spawn(async move {
                            let response = service
                                .handle_command(&client_id, request.request_id, request.command)
                                .await;
                            if let Err(e) = ipc.send_response(&client_id, response).await {
                                debug!(client_id = %client_id, error = %e, "Response not delivered");
                            }
                        });
                    }
                    Some(ServerMessage::ClientConnected { client_id, peer }) => {
                        debug!(client_id = %client_id, uid = ?peer.uid, "Client registered");
                    }
                    Some(ServerMessage::ClientDisconnected { client_id }) => {
                        debug!(client_id = %client_id, "Client disconnected");
                    }
                    None => break,
                },
            }
        }

        info!("Shutting down clockworkd");
        ipc.broadcast_event(Event::new(EventPayload::Shutdown));
        self.manager.close().await;
        ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }
}

/// Reply for a connect whose handle is already installed. A failed
/// follow-up ping is reported in the reply, not as a failed connect.
fn connected_reply(engine: EngineKind, ping: ClockworkResult<Duration>) -> ResponsePayload {
    match ping {
        Ok(latency) => ResponsePayload::Connected {
            engine,
            latency_ms: Some(latency.as_millis() as u64),
            ping_error: None,
        },
        Err(e) => {
            warn!(engine = %engine, error = %e, "Connected, but the first ping failed");
            ResponsePayload::Connected {
                engine,
                latency_ms: None,
                ping_error: Some(e.to_string()),
            }
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::GetHealth => "get_health",
        Command::Connect { .. } => "connect",
        Command::Disconnect => "disconnect",
        Command::GetSettings => "get_settings",
        Command::UpdateSettings { .. } => "update_settings",
        Command::ListUsers { .. } => "list_users",
        Command::BuildReport { .. } => "build_report",
        Command::GetPresence { .. } => "get_presence",
        Command::Export { .. } => "export",
        Command::ListExports => "list_exports",
        Command::DeleteExports { .. } => "delete_exports",
        Command::ClearExports => "clear_exports",
        Command::SubscribeEvents => "subscribe_events",
        Command::UnsubscribeEvents => "unsubscribe_events",
        Command::Ping => "ping",
    }
}
