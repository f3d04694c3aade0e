use crate::{
    cli::{
        CollectorsCommand,
        Command,
        ConfigCommand,
        ContainersCommand,
        PasswordCommand,
        PrefsCommand,
        SeriesKind,
    },
    output,
};
use color_eyre::Result;
use eyre::{
    bail,
    Context as _,
};
use perf_dashboard_client::{
    api::{
        CollectorsApi,
        ContainersApi,
    },
    cache::QueryClient,
    models::{
        CollectorPatch,
        LoginCredentials,
    },
    queries::{
        CollectorQueries,
        ContainerQueries,
    },
    ApiClient,
    AuthService,
    Dashboard,
    DashboardLocation,
    Navigator,
    Route,
    RouteAccess,
    SessionStatus,
    SessionStore,
};
use perf_dashboard_config::{
    Config,
    MetricKind,
    PreferencesStore,
    TimeRange,
};
use tokio_util::sync::DropGuard;

/// Wires the stores, the HTTP client and the query cache together and runs one command.
pub struct App {
    config: Config,
    preferences: PreferencesStore,
    navigator: Navigator,
    auth: AuthService,
    collectors: CollectorQueries,
    containers: ContainerQueries,
    _clear_cache_on_logout: DropGuard,
}

impl App {
    /// Must be called inside the tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        let session = SessionStore::load_from_data_dir(config.data_dir());
        let status = session.rehydrate();
        debug!(%status, "session restored");
        let navigator = Navigator::new(match status {
            SessionStatus::Authenticated => Route::Dashboard,
            SessionStatus::Loading | SessionStatus::Unauthenticated => Route::Login,
        });
        let preferences = PreferencesStore::load_from_config_dir(config.config_dir());

        let client = ApiClient::from_config(&config, session, navigator.clone())?;
        let cache = QueryClient::new();
        let auth = AuthService::new(client.clone(), cache.clone());
        let clear_cache_on_logout = auth.clear_cache_on_logout();

        Ok(Self {
            collectors: CollectorQueries::new(CollectorsApi::new(client.clone()), cache.clone()),
            containers: ContainerQueries::new(ContainersApi::new(client), cache),
            config,
            preferences,
            navigator,
            auth,
            _clear_cache_on_logout: clear_cache_on_logout,
        })
    }

    pub async fn run(mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { username, password } => self.login(username, password).await,
            Command::Logout => self.logout().await,
            Command::Whoami => {
                self.require_session()?;
                let user = self.auth.current_user().await?;
                println!("{}", output::user_table(&user));
                Ok(())
            }
            Command::Password(command) => self.password(command).await,
            Command::Collectors(command) => self.collectors(command).await,
            Command::Metrics { kind, collector, range } => self.metrics(kind, collector, range).await,
            Command::Compare { collectors, range } => self.compare(&collectors, range).await,
            Command::Containers(command) => self.containers(command).await,
            Command::Prefs(command) => self.prefs(command),
            Command::Config(command) => self.config(command),
            Command::Watch { location } => self.watch(location).await,
        }
    }

    fn require_session(&self) -> Result<()> {
        match Route::Dashboard.access(&self.auth.session().snapshot()) {
            RouteAccess::Allowed => Ok(()),
            RouteAccess::Loading => bail!("The session is still being restored"),
            RouteAccess::Redirect(_) => bail!("Not signed in, run `perfdash login` first"),
        }
    }

    fn range(&self, range: Option<TimeRange>) -> TimeRange {
        range.unwrap_or_else(|| self.preferences.get().default_time_range)
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

    async fn login(&self, username: String, password: String) -> Result<()> {
        let credentials = LoginCredentials { username, password };
        let user = self.auth.login(&credentials).await.wrap_err("Sign in failed")?;
        println!("Signed in as {}", user.display_name());
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        if !self.auth.session().is_authenticated() {
            println!("Not signed in");
            return Ok(());
        }
        self.auth.logout().await;
        println!("Signed out");
        Ok(())
    }

    async fn password(&self, command: PasswordCommand) -> Result<()> {
        match command {
            PasswordCommand::Change { old, new } => {
                self.require_session()?;
                self.auth
                    .change_password(&old, &new)
                    .await
                    .wrap_err("Failed to change the password")?;
                println!("Password changed");
            }
            PasswordCommand::Reset { email } => {
                self.auth
                    .request_password_reset(&email)
                    .await
                    .wrap_err("Failed to request a password reset")?;
                println!("If {email} belongs to an account, a reset link is on its way");
            }
        }
        Ok(())
    }

    async fn collectors(&self, command: CollectorsCommand) -> Result<()> {
        self.require_session()?;
        match command {
            CollectorsCommand::List => {
                let collectors = self.collectors.list().await?;
                println!("{}", output::collectors_table(&collectors));
            }
            CollectorsCommand::Show { id } => {
                let collector = self.collectors.get(id).await?;
                println!("{}", output::collector_table(&collector));
            }
            CollectorsCommand::Create { fields } => {
                let patch = CollectorPatch::from(fields);
                if patch.name.is_none() || patch.hostname.is_none() || patch.ip_address.is_none() {
                    bail!("--name, --hostname and --ip-address are required");
                }
                let collector = self.collectors.create(&patch).await.wrap_err("Failed to create collector")?;
                println!("{}", output::collector_table(&collector));
            }
            CollectorsCommand::Update { id, fields } => {
                let patch = CollectorPatch::from(fields);
                if patch.is_empty() {
                    bail!("Nothing to update");
                }
                let collector = self
                    .collectors
                    .update(id, &patch)
                    .await
                    .wrap_err_with(|| format!("Failed to update collector {id}"))?;
                println!("{}", output::collector_table(&collector));
            }
            CollectorsCommand::Delete { id } => {
                self.collectors
                    .delete(id)
                    .await
                    .wrap_err_with(|| format!("Failed to delete collector {id}"))?;
                println!("Deleted collector {id}");
            }
        }
        Ok(())
    }

    async fn metrics(&self, kind: SeriesKind, collector: u64, range: Option<TimeRange>) -> Result<()> {
        self.require_session()?;
        let range = self.range(range);
        let (queries, id) = (&self.collectors, Some(collector));
        let cache = queries.cache();
        let table = match kind {
            SeriesKind::Cpu => output::cpu_table(&cache.fetch(&queries.cpu_query(id, range)).await?),
            SeriesKind::Memory => output::memory_table(&cache.fetch(&queries.memory_query(id, range)).await?),
            SeriesKind::Disk => output::disk_table(&cache.fetch(&queries.disk_query(id, range)).await?),
            SeriesKind::Network => output::network_table(&cache.fetch(&queries.network_query(id, range)).await?),
            SeriesKind::Stats => output::stats_table(&cache.fetch(&queries.stats_query(id, range)).await?),
            SeriesKind::Percentiles => {
                output::percentiles_table(&cache.fetch(&queries.percentiles_query(id, range)).await?)
            }
        };
        println!("{table}");
        Ok(())
    }

    async fn compare(&self, collectors: &[u64], range: Option<TimeRange>) -> Result<()> {
        self.require_session()?;
        if collectors.len() < 2 {
            bail!("Comparing needs at least two collectors");
        }
        let query = self.collectors.compare_query(collectors, self.range(range));
        let data = self.collectors.cache().fetch(&query).await?;
        println!("{}", output::comparison_table(&data));
        Ok(())
    }

    async fn containers(&self, command: ContainersCommand) -> Result<()> {
        self.require_session()?;
        let cache = self.collectors.cache();
        match command {
            ContainersCommand::List { collector } => {
                let containers = self.containers.list(collector).await?;
                println!("{}", output::containers_table(&containers));
            }
            ContainersCommand::Show { collector, id } => {
                let container = cache
                    .fetch(&self.containers.detail_query(Some(collector), Some(id)))
                    .await?;
                println!("{}", output::container_table(&container));
            }
            ContainersCommand::Metrics {
                collector,
                id,
                kind,
                range,
            } => {
                if kind == MetricKind::Disk {
                    bail!("Containers report cpu, memory and network only");
                }
                let query = self
                    .containers
                    .metrics_query(Some(collector), Some(id), kind, self.range(range));
                let metrics = cache.fetch(&query).await?;
                println!("{}", output::container_metrics_table(&metrics));
            }
            ContainersCommand::Aggregate { collector, range } => {
                let query = self.containers.aggregate_query(Some(collector), self.range(range));
                let aggregate = cache.fetch(&query).await?;
                println!("{}", output::aggregate_table(&aggregate));
            }
        }
        Ok(())
    }

    fn prefs(&self, command: PrefsCommand) -> Result<()> {
        match command {
            PrefsCommand::Show => {}
            PrefsCommand::Set { field, value } => self
                .preferences
                .set_field(field, &value)
                .wrap_err_with(|| format!("Failed to set {field}"))?,
            PrefsCommand::Reset => self.preferences.reset_to_defaults()?,
        }
        println!("{}", output::preferences_table(&self.preferences.get()));
        Ok(())
    }

    fn config(&mut self, command: ConfigCommand) -> Result<()> {
        if let ConfigCommand::SetApiUrl { url } = command {
            info!(old = %self.config.api_url, new = %url, "changing API URL");
            self.config.api_url = url;
            self.config.save()?;
        }
        println!("{}", output::config_table(&self.config));
        Ok(())
    }

    async fn watch(&self, location: Option<String>) -> Result<()> {
        self.require_session()?;
        let location = DashboardLocation::parse(location.as_deref().unwrap_or_default());
        let mut dashboard = Dashboard::new(
            self.collectors.clone(),
            self.containers.clone(),
            self.preferences.clone(),
            location,
        );
        if dashboard.resolve_selection().await?.is_none() {
            bail!("There are no collectors to show");
        }

        // Keeps the collector list refetching while the panels are shown.
        let _collectors = dashboard.observe_collectors();
        let mut panels = dashboard.observe_panels();
        let mut routes = self.navigator.subscribe();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        info!(location = %dashboard.location(), "watching dashboard");

        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                changed = routes.changed() => {
                    if changed.is_err() || *routes.borrow_and_update() == Route::Login {
                        bail!("The session expired, run `perfdash login` again");
                    }
                }
                changed = panels.changed() => {
                    if !changed {
                        break;
                    }
                    if !panels.is_fetching() {
                        println!("{}", output::panels_table(&dashboard.location(), &panels));
                    }
                }
            }
        }
        debug!("stopped watching");
        Ok(())
    }
}
