//! Configuration for the E-utilities client and the automater's pass-through
//! search parameters.

use std::time::Duration;

use crate::automater::MAX_RETRIEVAL_LIMIT;

/// Default NCBI E-utilities endpoint
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Tool identifier attached to every outgoing request unless overridden
pub const DEFAULT_TOOL: &str = "J-eUtils";

/// Contact address attached to every outgoing request unless overridden
pub const DEFAULT_EMAIL: &str = "gregcope@algosome.com";

/// Database searched when none is configured
pub const DB_PUBMED: &str = "pubmed";

/// Search and fetch parameters handed to the E-utilities collaborator
///
/// The automater never interprets these values; they only shape the ESearch
/// and EFetch requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrezParameters {
    pub database: String,
    /// Whether ESearch results are posted to the history server
    pub use_history: bool,
    pub ret_type: String,
    pub ret_mode: String,
    /// Maximum number of identifiers returned per ESearch call
    ///
    /// The client raises it to the number of terms in the query so a batch
    /// of accessions is never cut short.
    pub ret_max: usize,
    /// Log raw ESearch responses at info level
    pub print_esearch_output: bool,
    /// Log EFetch requests at info level
    pub print_efetch_output: bool,
}

impl Default for EntrezParameters {
    fn default() -> Self {
        Self {
            database: DB_PUBMED.to_string(),
            use_history: false,
            ret_type: "xml".to_string(),
            ret_mode: "xml".to_string(),
            ret_max: MAX_RETRIEVAL_LIMIT,
            print_esearch_output: false,
            print_efetch_output: false,
        }
    }
}

impl EntrezParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn with_use_history(mut self, use_history: bool) -> Self {
        self.use_history = use_history;
        self
    }

    pub fn with_ret_type(mut self, ret_type: &str) -> Self {
        self.ret_type = ret_type.to_string();
        self
    }

    pub fn with_ret_mode(mut self, ret_mode: &str) -> Self {
        self.ret_mode = ret_mode.to_string();
        self
    }

    pub fn with_ret_max(mut self, ret_max: usize) -> Self {
        self.ret_max = ret_max;
        self
    }

    pub fn with_print_esearch_output(mut self, enabled: bool) -> Self {
        self.print_esearch_output = enabled;
        self
    }

    pub fn with_print_efetch_output(mut self, enabled: bool) -> Self {
        self.print_efetch_output = enabled;
        self
    }

    /// The `usehistory` query value expected by ESearch
    pub fn use_history_flag(&self) -> &'static str {
        if self.use_history { "y" } else { "n" }
    }
}

/// Configuration for the E-utilities HTTP client
///
/// # Example
///
/// ```
/// use eutils_automater::{ClientConfig, EntrezParameters};
///
/// let config = ClientConfig::new()
///     .with_api_key("your_api_key_here")
///     .with_email("researcher@university.edu")
///     .with_parameters(EntrezParameters::new().with_database("nuccore"));
///
/// assert_eq!(config.parameters.database, "nuccore");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub tool: Option<String>,
    pub base_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout: Duration,
    pub parameters: EntrezParameters,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            email: Some(DEFAULT_EMAIL.to_string()),
            tool: Some(DEFAULT_TOOL.to_string()),
            base_url: None,
            user_agent: None,
            timeout: Duration::from_secs(30),
            parameters: EntrezParameters::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the NCBI API key
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Set the contact email sent with each request
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Set the tool name sent with each request
    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tool = Some(tool.to_string());
        self
    }

    /// Point the client at a different E-utilities endpoint (mock servers, mirrors)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_parameters(mut self, parameters: EntrezParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("eutils-automater/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn effective_tool(&self) -> &str {
        self.tool.as_deref().unwrap_or(DEFAULT_TOOL)
    }

    /// Parameters appended to every request (api_key, email, tool)
    pub fn build_api_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(api_key) = &self.api_key {
            params.push(("api_key".to_string(), api_key.clone()));
        }

        if let Some(email) = &self.email {
            params.push(("email".to_string(), email.clone()));
        }

        params.push(("tool".to_string(), self.effective_tool().to_string()));

        params
    }
}
