use std::collections::BTreeMap;
use std::env;

use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Default Microsoft Graph API root.
pub const GRAPH_API_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";
/// Resource the access token is requested for.
pub const GRAPH_RESOURCE: &str = "https://graph.microsoft.com";
/// Instance metadata service token endpoint.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
/// Default Entra ID authority host.
pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Comma separated token strategies, tried in order
    #[arg(long, env = "TOKEN_STRATEGIES", value_delimiter = ',')]
    pub token_strategies: Option<Vec<TokenStrategy>>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub token: TokenConfig,
    pub graph: GraphConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// How callers prove who they are.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Platform-injected `X-MS-CLIENT-PRINCIPAL` header.
    #[default]
    ClientPrincipal,
    /// Credential table with a login form and HTTP Basic on `/home`.
    Basic,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Username to password table for [`AuthMode::Basic`].
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    /// Cookie set after a successful form login.
    pub cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            users: BTreeMap::new(),
            cookie_name: "username".to_string(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .field("users", &self.users.len())
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

/// A single way of obtaining an access token.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenStrategy {
    Static,
    ManagedIdentity,
    ClientSecret,
    Forwarded,
    DeveloperCli,
}

impl TokenStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::ManagedIdentity => "managed_identity",
            Self::ClientSecret => "client_secret",
            Self::Forwarded => "forwarded",
            Self::DeveloperCli => "developer_cli",
        }
    }
}

impl std::fmt::Display for TokenStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "static" => Ok(Self::Static),
            "managed_identity" => Ok(Self::ManagedIdentity),
            "client_secret" => Ok(Self::ClientSecret),
            "forwarded" => Ok(Self::Forwarded),
            "developer_cli" => Ok(Self::DeveloperCli),
            other => Err(format!("unknown token strategy: {other}")),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct TokenConfig {
    /// Strategies tried in order until one yields a token.
    pub strategies: Vec<TokenStrategy>,
    /// Fixed token for [`TokenStrategy::Static`].
    #[serde(default)]
    pub static_token: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub authority_host: String,
    pub managed_identity: ManagedIdentityConfig,
    /// Inbound header carrying a platform-forwarded access token.
    pub forwarded_header: String,
    /// Program used by [`TokenStrategy::DeveloperCli`].
    pub cli_program: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            strategies: vec![TokenStrategy::ManagedIdentity],
            static_token: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            authority_host: AUTHORITY_HOST.to_string(),
            managed_identity: ManagedIdentityConfig::default(),
            forwarded_header: "x-ms-token-aad-access-token".to_string(),
            cli_program: "az".to_string(),
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("strategies", &self.strategies)
            .field("static_token", &self.static_token.as_ref().map(|_| "***"))
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("authority_host", &self.authority_host)
            .field("managed_identity", &self.managed_identity)
            .field("forwarded_header", &self.forwarded_header)
            .field("cli_program", &self.cli_program)
            .finish()
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct ManagedIdentityConfig {
    pub endpoint: String,
    /// App Service identity header. When set, the App Service protocol is used
    /// instead of IMDS.
    #[serde(default)]
    pub identity_header: Option<String>,
    /// Client id of a user-assigned identity.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Default for ManagedIdentityConfig {
    fn default() -> Self {
        Self {
            endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            identity_header: None,
            client_id: None,
        }
    }
}

impl std::fmt::Debug for ManagedIdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedIdentityConfig")
            .field("endpoint", &self.endpoint)
            .field("identity_header", &self.identity_header.as_ref().map(|_| "***"))
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Which profile is fetched from Graph.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphTarget {
    /// `GET /me` as the token's subject.
    #[default]
    Me,
    /// `GET /users/{object id}` of the authenticated principal.
    PrincipalObject,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GraphConfig {
    pub base_url: String,
    pub resource: String,
    pub target: GraphTarget,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: GRAPH_API_ENDPOINT.to_string(),
            resource: GRAPH_RESOURCE.to_string(),
            target: GraphTarget::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        // 1. Defaults
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // 2. Config file: explicit path must exist, ./config.* is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Environment variables (prefixed with PORTAL_), e.g. PORTAL_SERVER__PORT=9000
        builder = builder.add_source(
            Environment::with_prefix("PORTAL")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("token.strategies")
                .try_parsing(true),
        );

        // 4. Well-known platform variables
        for (var, key) in [
            ("AZURE_TENANT_ID", "token.tenant_id"),
            ("AZURE_CLIENT_ID", "token.client_id"),
            ("AZURE_CLIENT_SECRET", "token.client_secret"),
        ] {
            if let Some(val) = platform_var(var) {
                builder = builder.set_override(key, val)?;
            }
        }

        // The App Service endpoint only speaks its own protocol, which needs the header.
        match (platform_var("IDENTITY_ENDPOINT"), platform_var("IDENTITY_HEADER")) {
            (Some(endpoint), Some(identity_header)) => {
                builder = builder
                    .set_override("token.managed_identity.endpoint", endpoint)?
                    .set_override("token.managed_identity.identity_header", identity_header)?;
            }
            (None, None) => {}
            (endpoint, _) => {
                tracing::warn!(
                    name: "portal.config.identity_endpoint.ignored",
                    endpoint_set = endpoint.is_some(),
                    "IDENTITY_ENDPOINT and IDENTITY_HEADER must be set together; ignoring both"
                );
            }
        }

        // 5. CLI flags (clap also resolves PORT)
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(strategies) = cli.token_strategies {
            let names: Vec<String> = strategies.iter().map(|s| s.as_str().to_string()).collect();
            builder = builder.set_override("token.strategies", names)?;
        }

        let cfg = builder.build()?;
        let config: Self = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that can never serve a request.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.token.strategies.is_empty() {
            return Err(config::ConfigError::Message(
                "token.strategies must name at least one strategy".to_string(),
            ));
        }
        if self.auth.mode == AuthMode::Basic && self.graph.target == GraphTarget::PrincipalObject {
            return Err(config::ConfigError::Message(
                "graph.target principal_object requires auth.mode client_principal".to_string(),
            ));
        }
        Ok(())
    }
}

/// Non-blank value of a platform-provided environment variable.
fn platform_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|val| !val.trim().is_empty())
}
