use crate::tickets::{Category, ACCOUNT_AGENT, TECHNICAL_AGENT};
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const CONFIG_DIR_ENV: &str = "TICKETDESK_CONFIG_DIR";
const CONFIG_FILE_NAME: &str = "config.toml";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level ticketdesk configuration, loaded from `config.toml`.
///
/// Resolution order: `TICKETDESK_CONFIG_DIR` env → `~/.ticketdesk/config.toml`.
/// Every rule table the router and the agents consult lives here so tests
/// and deployments can substitute their own.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Directory holding config.toml; relative queue paths resolve against it
    #[serde(skip)]
    pub config_dir: PathBuf,

    /// HTTP gateway bind settings (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Base URLs of the router and agent services (`[endpoints]`).
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Outbound HTTP timeouts used by the orchestrator (`[transport]`).
    #[serde(default)]
    pub transport: TransportConfig,

    /// Audit queue backend (`[queue]`).
    #[serde(default)]
    pub queue: QueueConfig,

    /// Keyword tables and category routes (`[classifier]`).
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Technical knowledge base (`[knowledge]`).
    #[serde(default)]
    pub knowledge: KnowledgeBaseConfig,

    /// Department license capacity (`[accounts]`).
    #[serde(default)]
    pub accounts: AccountsConfig,
}

// ── Gateway ──────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    /// Per-request timeout for inbound requests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_body_limit_bytes() -> usize {
    64 * 1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            body_limit_bytes: default_body_limit_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ── Endpoints ────────────────────────────────────────────────────

/// Base URLs the orchestrator posts to. Keys are agent names without the
/// `_agent` suffix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointsConfig {
    #[serde(default = "default_router_url")]
    pub router: String,
    #[serde(default = "default_technical_url")]
    pub technical: String,
    #[serde(default = "default_account_url")]
    pub account: String,
}

fn default_router_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_technical_url() -> String {
    "http://127.0.0.1:8002".to_string()
}

fn default_account_url() -> String {
    "http://127.0.0.1:8003".to_string()
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            router: default_router_url(),
            technical: default_technical_url(),
            account: default_account_url(),
        }
    }
}

impl EndpointsConfig {
    /// Static name → endpoint table.
    pub fn table(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("router".to_string(), self.router.clone()),
            ("technical".to_string(), self.technical.clone()),
            ("account".to_string(), self.account.clone()),
        ])
    }

    /// Point every service at one all-in-one gateway.
    pub fn single_gateway(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            router: base.to_string(),
            technical: format!("{base}/technical"),
            account: format!("{base}/account"),
        }
    }
}

// ── Transport ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    #[serde(default = "default_transport_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_transport_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_transport_timeout_secs() -> u64 {
    10
}

fn default_transport_connect_timeout_secs() -> u64 {
    3
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_transport_timeout_secs(),
            connect_timeout_secs: default_transport_connect_timeout_secs(),
        }
    }
}

// ── Queue ────────────────────────────────────────────────────────

/// Audit queue configuration (`[queue]` section).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueConfig {
    /// "memory" or "sqlite"
    #[serde(default = "default_queue_backend")]
    pub backend: String,
    /// SQLite file; relative paths resolve against the config directory
    #[serde(default = "default_queue_path")]
    pub path: String,
    /// How long a durable pop waits for an entry before giving up
    #[serde(default = "default_pop_timeout_ms")]
    pub pop_timeout_ms: u64,
}

fn default_queue_backend() -> String {
    "sqlite".to_string()
}

fn default_queue_path() -> String {
    "queue.db".to_string()
}

fn default_pop_timeout_ms() -> u64 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
            path: default_queue_path(),
            pop_timeout_ms: default_pop_timeout_ms(),
        }
    }
}

impl QueueConfig {
    pub fn resolved_path(&self, config_dir: &Path) -> PathBuf {
        let path = PathBuf::from(&self.path);
        if path.is_absolute() {
            path
        } else {
            config_dir.join(path)
        }
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }
}

// ── Classifier ───────────────────────────────────────────────────

/// Category → agent name. TRAINING shares the technical agent by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutesConfig {
    #[serde(default = "default_technical_route")]
    pub technical: String,
    #[serde(default = "default_account_route")]
    pub account: String,
    #[serde(default = "default_technical_route")]
    pub training: String,
}

fn default_technical_route() -> String {
    TECHNICAL_AGENT.to_string()
}

fn default_account_route() -> String {
    ACCOUNT_AGENT.to_string()
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            technical: default_technical_route(),
            account: default_account_route(),
            training: default_technical_route(),
        }
    }
}

impl RoutesConfig {
    pub fn agent_for(&self, category: Category) -> &str {
        match category {
            Category::Technical => &self.technical,
            Category::Account => &self.account,
            Category::Training => &self.training,
        }
    }
}

/// Keyword tables for categorization and priority (`[classifier]` section).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default = "default_technical_keywords")]
    pub technical_keywords: Vec<String>,
    #[serde(default = "default_account_keywords")]
    pub account_keywords: Vec<String>,
    /// Departments whose tickets start at HIGH priority (exact match)
    #[serde(default = "default_critical_departments")]
    pub critical_departments: Vec<String>,
    /// Any of these in the text raises priority to CRITICAL
    #[serde(default = "default_critical_keywords")]
    pub critical_keywords: Vec<String>,
    /// Any of these in the text lowers priority to LOW, overriding everything
    #[serde(default = "default_low_priority_keywords")]
    pub low_priority_keywords: Vec<String>,
    /// Confidence reported on routing messages
    #[serde(default = "default_routing_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub routes: RoutesConfig,
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

fn default_technical_keywords() -> Vec<String> {
    strings(&[
        "dashboard",
        "connection",
        "slow",
        "error",
        "loading",
        "refresh",
        "database",
        "server",
        "timeout",
        "visualization",
        "chart",
        "performance",
    ])
}

fn default_account_keywords() -> Vec<String> {
    strings(&[
        "access",
        "user",
        "login",
        "permission",
        "license",
        "account",
        "add user",
        "remove",
        "department",
        "role",
        "upgrade",
    ])
}

fn default_critical_departments() -> Vec<String> {
    strings(&["Trading", "Risk Management", "Executive"])
}

fn default_critical_keywords() -> Vec<String> {
    strings(&["trading", "p&l", "risk", "down", "critical", "urgent"])
}

fn default_low_priority_keywords() -> Vec<String> {
    strings(&["training", "how to"])
}

fn default_routing_confidence() -> f64 {
    0.85
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            technical_keywords: default_technical_keywords(),
            account_keywords: default_account_keywords(),
            critical_departments: default_critical_departments(),
            critical_keywords: default_critical_keywords(),
            low_priority_keywords: default_low_priority_keywords(),
            confidence: default_routing_confidence(),
            routes: RoutesConfig::default(),
        }
    }
}

// ── Knowledge base ───────────────────────────────────────────────

/// One known issue: symptoms to look for and the canned fix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueArchetype {
    pub name: String,
    pub symptoms: Vec<String>,
    pub solution: String,
    #[serde(default)]
    pub escalate: bool,
}

impl IssueArchetype {
    fn new(name: &str, symptoms: &[&str], solution: &str, escalate: bool) -> Self {
        Self {
            name: name.to_string(),
            symptoms: strings(symptoms),
            solution: solution.to_string(),
            escalate,
        }
    }
}

/// Technical knowledge base (`[knowledge]` section). Archetype order is
/// significant: the first archetype wins a tie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeBaseConfig {
    /// Appended to a matched solution whose archetype escalates
    #[serde(default = "default_escalation_note")]
    pub escalation_note: String,
    /// Reason recorded when a matched archetype escalates
    #[serde(default = "default_escalation_reason")]
    pub escalation_reason: String,
    /// Reply sent when no archetype matches
    #[serde(default = "default_unmatched_response")]
    pub unmatched_response: String,
    /// Reason recorded when no archetype matches
    #[serde(default = "default_unmatched_reason")]
    pub unmatched_reason: String,
    #[serde(default = "default_archetypes")]
    pub archetypes: Vec<IssueArchetype>,
}

fn default_escalation_note() -> String {
    "⚠️ **Escalation Required:** This issue requires specialized database team assistance."
        .to_string()
}

fn default_escalation_reason() -> String {
    "Database connectivity issue requiring DBA team".to_string()
}

fn default_unmatched_response() -> String {
    "I need to research this issue further. A senior technical specialist will follow up within 2 hours."
        .to_string()
}

fn default_unmatched_reason() -> String {
    "Complex technical issue requiring specialist review".to_string()
}

fn default_archetypes() -> Vec<IssueArchetype> {
    vec![
        IssueArchetype::new(
            "dashboard_loading",
            &["slow", "loading", "timeout", "dashboard"],
            "1. Check Tableau Server status\n2. Clear browser cache\n3. Reduce dashboard complexity\n4. Contact IT if server issues persist",
            false,
        ),
        IssueArchetype::new(
            "database_connection",
            &["connection", "database", "timeout", "oracle", "sql"],
            "1. Verify VPN connection\n2. Check database credentials\n3. Test connection from Tableau Desktop\n4. Contact DBA team if connectivity issues persist",
            true,
        ),
        IssueArchetype::new(
            "data_refresh",
            &["refresh", "extract", "data", "outdated"],
            "1. Check data source connection\n2. Verify refresh schedule\n3. Review extract logs\n4. Manually trigger refresh if needed",
            false,
        ),
        IssueArchetype::new(
            "visualization_error",
            &["chart", "visualization", "error", "display"],
            "1. Check calculated fields\n2. Verify data types\n3. Review filters and parameters\n4. Recreate visualization if corrupted",
            false,
        ),
    ]
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            escalation_note: default_escalation_note(),
            escalation_reason: default_escalation_reason(),
            unmatched_response: default_unmatched_response(),
            unmatched_reason: default_unmatched_reason(),
            archetypes: default_archetypes(),
        }
    }
}

// ── Accounts ─────────────────────────────────────────────────────

/// License capacity for one department. Read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepartmentCapacity {
    pub max_users: u64,
    pub current_users: u64,
    pub licenses: String,
}

impl DepartmentCapacity {
    fn new(max_users: u64, current_users: u64, licenses: &str) -> Self {
        Self {
            max_users,
            current_users,
            licenses: licenses.to_string(),
        }
    }

    pub fn available(&self) -> u64 {
        self.max_users.saturating_sub(self.current_users)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountsConfig {
    #[serde(default = "default_departments")]
    pub departments: BTreeMap<String, DepartmentCapacity>,
}

fn default_departments() -> BTreeMap<String, DepartmentCapacity> {
    BTreeMap::from([
        ("Trading".to_string(), DepartmentCapacity::new(900, 850, "Creator")),
        (
            "Risk Management".to_string(),
            DepartmentCapacity::new(450, 420, "Explorer"),
        ),
        ("Compliance".to_string(), DepartmentCapacity::new(400, 380, "Viewer")),
        ("Marketing".to_string(), DepartmentCapacity::new(300, 290, "Explorer")),
        ("Operations".to_string(), DepartmentCapacity::new(1250, 1200, "Viewer")),
        ("Finance".to_string(), DepartmentCapacity::new(700, 650, "Explorer")),
        ("Executive".to_string(), DepartmentCapacity::new(100, 80, "Creator")),
    ])
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            departments: default_departments(),
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

fn default_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".ticketdesk"))
}

impl Config {
    /// Load `config.toml` from the default directory, writing defaults on first run.
    pub async fn load_or_init() -> Result<Self> {
        let dir = default_config_dir()?;
        Self::load_or_init_at(&dir).await
    }

    /// Load `config.toml` from `dir`, writing defaults when it does not exist.
    pub async fn load_or_init_at(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let (mut config, initialized) = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            (config, false)
        } else {
            (Config::default(), true)
        };

        config.config_path = config_path;
        config.config_dir = dir.to_path_buf();
        if initialized {
            config.save().await?;
        }

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            queue_backend = %config.queue.backend,
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }

        match self.queue.backend.as_str() {
            "memory" | "sqlite" => {}
            other => anyhow::bail!(
                "Unknown queue.backend '{other}'. Supported values: memory, sqlite"
            ),
        }
        if self.queue.pop_timeout_ms == 0 {
            anyhow::bail!("queue.pop_timeout_ms must be greater than zero");
        }

        if self.classifier.technical_keywords.is_empty()
            || self.classifier.account_keywords.is_empty()
        {
            anyhow::bail!("classifier keyword tables must not be empty");
        }
        if !(0.0..=1.0).contains(&self.classifier.confidence) {
            anyhow::bail!("classifier.confidence must be between 0.0 and 1.0");
        }
        for category in Category::ALL {
            if self.classifier.routes.agent_for(category).trim().is_empty() {
                anyhow::bail!("classifier.routes.{category} must name an agent");
            }
        }

        for archetype in &self.knowledge.archetypes {
            if archetype.symptoms.is_empty() {
                anyhow::bail!(
                    "knowledge archetype '{}' must list at least one symptom",
                    archetype.name
                );
            }
        }

        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        // Gateway host: TICKETDESK_GATEWAY_HOST or HOST
        if let Ok(host) =
            std::env::var("TICKETDESK_GATEWAY_HOST").or_else(|_| std::env::var("HOST"))
        {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }

        // Gateway port: TICKETDESK_GATEWAY_PORT or PORT
        if let Ok(port_str) =
            std::env::var("TICKETDESK_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
        {
            if let Ok(port) = port_str.parse::<u16>() {
                self.gateway.port = port;
            }
        }

        if let Ok(backend) = std::env::var("TICKETDESK_QUEUE_BACKEND") {
            if !backend.is_empty() {
                self.queue.backend = backend.trim().to_ascii_lowercase();
            }
        }

        if let Ok(path) = std::env::var("TICKETDESK_QUEUE_PATH") {
            if !path.is_empty() {
                self.queue.path = path;
            }
        }

        for (var, slot) in [
            ("TICKETDESK_ROUTER_URL", &mut self.endpoints.router),
            ("TICKETDESK_TECHNICAL_URL", &mut self.endpoints.technical),
            ("TICKETDESK_ACCOUNT_URL", &mut self.endpoints.account),
        ] {
            if let Ok(url) = std::env::var(var) {
                if !url.is_empty() {
                    *slot = url;
                }
            }
        }
    }

    /// Write the config atomically: temp file in the same directory, then rename.
    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;
        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let temp_path =
            parent_dir.join(format!(".{CONFIG_FILE_NAME}.tmp-{}", uuid::Uuid::new_v4()));
        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).context("Failed to atomically replace config file");
        }
        Ok(())
    }
}
