use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, Response};
use tokio_util::io::StreamReader;
use tracing::{debug, info, instrument, warn};

use super::responses::ESearchResult;
use super::{EntrezService, Payload, SearchOutcome};
use crate::automater::TERM_DELIMITER;
use crate::config::ClientConfig;
use crate::error::{AutomaterError, Result};

/// E-utilities client performing ESearch and EFetch requests
#[derive(Clone)]
pub struct EutilsClient {
    client: Client,
    base_url: String,
    config: ClientConfig,
}

impl EutilsClient {
    /// Create a new client with default configuration
    ///
    /// # Example
    ///
    /// ```
    /// use eutils_automater::EutilsClient;
    ///
    /// let client = EutilsClient::new().unwrap();
    /// ```
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::new())
    }

    /// Create a new client with custom configuration
    ///
    /// # Example
    ///
    /// ```
    /// use eutils_automater::{ClientConfig, EutilsClient};
    ///
    /// let config = ClientConfig::new()
    ///     .with_api_key("your_api_key_here")
    ///     .with_email("researcher@university.edu");
    ///
    /// let client = EutilsClient::with_config(config).unwrap();
    /// ```
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.effective_user_agent())
            .timeout(config.timeout)
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Create a client around an existing reqwest client
    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        let base_url = config.effective_base_url().to_string();

        Self {
            client,
            base_url,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run an ESearch for a pre-rendered query string
    ///
    /// The term is expected to be already escaped the way the batcher renders
    /// it (`%20` for spaces, `,` between terms) and is sent without further
    /// percent-encoding.
    #[instrument(skip(self), fields(term = %term))]
    pub async fn esearch(&self, term: &str) -> Result<SearchOutcome> {
        let params = &self.config.parameters;
        let url = format!(
            "{}/esearch.fcgi?db={}&term={}&retmax={}&usehistory={}&retmode=json",
            self.base_url,
            urlencoding::encode(&params.database),
            escape_term(term),
            params.ret_max.max(term_count(term)),
            params.use_history_flag()
        );

        debug!("Making ESearch API request");
        let response = self.make_request(&url).await?;
        let body = response.text().await?;

        if params.print_esearch_output {
            info!(response = %body, "ESearch output");
        }

        let search_result: ESearchResult = serde_json::from_str(&body)?;
        let data = search_result.esearchresult;

        // NCBI sometimes returns 200 OK with an ERROR field
        if let Some(error_msg) = data.error {
            return Err(AutomaterError::ApiError {
                status: 200,
                message: format!("NCBI ESearch API error: {}", error_msg),
            });
        }

        let count = data
            .count
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(data.idlist.len());

        info!(
            results_found = data.idlist.len(),
            total = count,
            "Search completed successfully"
        );

        Ok(SearchOutcome {
            ids: data.idlist,
            count,
            webenv: data.webenv,
            query_key: data.query_key,
        })
    }

    /// Run an EFetch for the records of a previous search
    ///
    /// Uses the history server session when history is enabled and the
    /// search returned one, otherwise the identifier list.
    #[instrument(skip(self, outcome), fields(ids_count = outcome.ids.len()))]
    pub async fn efetch(&self, outcome: &SearchOutcome) -> Result<Payload> {
        let params = &self.config.parameters;
        let mut url = format!(
            "{}/efetch.fcgi?db={}&retmode={}&rettype={}",
            self.base_url,
            urlencoding::encode(&params.database),
            urlencoding::encode(&params.ret_mode),
            urlencoding::encode(&params.ret_type)
        );

        match (&outcome.webenv, &outcome.query_key) {
            (Some(webenv), Some(query_key)) if params.use_history => {
                url.push_str(&format!(
                    "&WebEnv={}&query_key={}",
                    urlencoding::encode(webenv),
                    urlencoding::encode(query_key)
                ));
            }
            _ => {
                url.push_str("&id=");
                url.push_str(&urlencoding::encode(&outcome.ids.join(",")));
            }
        }

        if params.print_efetch_output {
            info!(url = %url, "EFetch request");
        }

        debug!("Making EFetch API request");
        let response = self.make_request(&url).await?;
        let stream = response.bytes_stream().map_err(std::io::Error::other);

        Ok(Payload::new(StreamReader::new(stream)))
    }

    /// Internal helper for GET requests
    /// Appends API parameters (api_key, email, tool) to the URL
    async fn make_request(&self, url: &str) -> Result<Response> {
        let mut final_url = url.to_string();
        let api_params = self.config.build_api_params();

        if !api_params.is_empty() {
            let separator = if url.contains('?') { '&' } else { '?' };
            final_url.push(separator);

            let param_strings: Vec<String> = api_params
                .into_iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
                .collect();
            final_url.push_str(&param_strings.join("&"));
        }

        debug!("Making API request to: {}", final_url);
        let response = self.client.get(&final_url).send().await?;

        if !response.status().is_success() {
            warn!("API request failed with status: {}", response.status());
            return Err(AutomaterError::ApiError {
                status: response.status().as_u16(),
                message: response
                    .status()
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl EntrezService for EutilsClient {
    async fn search(&self, term: &str) -> Result<SearchOutcome> {
        self.esearch(term).await
    }

    async fn fetch(&self, outcome: &SearchOutcome) -> Result<Payload> {
        self.efetch(outcome).await
    }
}

/// Number of comma-separated terms in a rendered query
fn term_count(term: &str) -> usize {
    term.split(TERM_DELIMITER).filter(|t| !t.is_empty()).count()
}

/// Escape the characters that would split or truncate a query parameter
fn escape_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '&' => escaped.push_str("%26"),
            '#' => escaped.push_str("%23"),
            '+' => escaped.push_str("%2B"),
            '=' => escaped.push_str("%3D"),
            ' ' => escaped.push_str("%20"),
            _ => escaped.push(c),
        }
    }
    escaped
}
