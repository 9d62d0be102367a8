//! End-to-end automater runs against a mocked NCBI server
//!
//! The pacing interval is shortened so the runs finish quickly; everything
//! else goes through the real E-utilities client.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eutils_automater::automater::{MAX_ERRORS_EXCEEDED, MAX_RETRIEVAL_LIMIT};
use eutils_automater::{
    Automater, ClientConfig, EntrezParameters, EutilsClient, OutputListener, RunState,
};
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_PACING: Duration = Duration::from_millis(10);

#[derive(Default)]
struct Collector {
    data: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl OutputListener for Collector {
    fn on_data(&self, data: &str) {
        self.data.lock().unwrap().push(data.to_string());
    }

    fn on_notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn create_automater(mock_server: &MockServer, terms: &[&str]) -> Automater {
    let config = ClientConfig::new().with_base_url(mock_server.uri());
    let client = EutilsClient::with_config(config).expect("client should build");

    Automater::with_service(terms.iter().copied(), Arc::new(client))
        .expect("terms are not empty")
        .with_pacing_interval(TEST_PACING)
}

async fn mount_search(mock_server: &MockServer, term: &str, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("term", term))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "esearchresult": {
                "count": ids.len().to_string(),
                "idlist": ids
            }
        })))
        .expect(1)
        .mount(mock_server)
        .await;
}

async fn mount_fetch(mock_server: &MockServer, ids: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", ids))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(mock_server)
        .await;
}

#[tokio::test]
#[traced_test]
async fn test_batches_with_remainder() {
    let mock_server = MockServer::start().await;
    mount_search(&mock_server, "A,B", &["1", "2"]).await;
    mount_search(&mock_server, "C", &["3"]).await;
    mount_fetch(&mock_server, "1,2", "<records>1 2</records>\n").await;
    mount_fetch(&mock_server, "3", "<records>3</records>\n").await;

    let automater = create_automater(&mock_server, &["A", "B", "C"]);
    automater.set_max_retrieval(2).unwrap();
    let collector = Arc::new(Collector::default());
    automater.add_output_listener(collector.clone());

    let state = automater.start().unwrap().await.unwrap();

    assert_eq!(state, RunState::Completed);
    assert_eq!(
        *collector.data.lock().unwrap(),
        vec!["<records>1 2</records>\n", "<records>3</records>\n"]
    );
    assert!(collector.errors.lock().unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_full_batch_requests_every_record() {
    let mock_server = MockServer::start().await;
    let accessions: Vec<String> = (0..MAX_RETRIEVAL_LIMIT)
        .map(|i| format!("NM_{:06}", i))
        .collect();
    let ids: Vec<String> = (0..MAX_RETRIEVAL_LIMIT).map(|i| i.to_string()).collect();

    // a lower configured retmax is raised to the batch size
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("retmax", MAX_RETRIEVAL_LIMIT.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "esearchresult": {
                "count": ids.len().to_string(),
                "idlist": ids
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_fetch(&mock_server, &ids.join(","), "<records/>\n").await;

    let config = ClientConfig::new()
        .with_base_url(mock_server.uri())
        .with_parameters(EntrezParameters::default().with_ret_max(20));
    let client = EutilsClient::with_config(config).expect("client should build");
    let automater = Automater::with_service(accessions, Arc::new(client))
        .unwrap()
        .with_pacing_interval(TEST_PACING);
    automater.set_max_retrieval(MAX_RETRIEVAL_LIMIT).unwrap();
    let collector = Arc::new(Collector::default());
    automater.add_output_listener(collector.clone());

    let state = automater.start().unwrap().await.unwrap();

    assert_eq!(state, RunState::Completed);
    assert_eq!(*collector.data.lock().unwrap(), vec!["<records/>\n"]);
}

#[tokio::test]
#[traced_test]
async fn test_terms_with_spaces_reach_the_server_decoded() {
    let mock_server = MockServer::start().await;
    mount_search(&mock_server, "breast cancer,tp53 mutation", &[]).await;

    let automater = create_automater(&mock_server, &["breast  cancer", " tp53\tmutation "]);
    automater.set_max_retrieval(2).unwrap();
    let collector = Arc::new(Collector::default());
    automater.add_output_listener(collector.clone());

    let state = automater.start().unwrap().await.unwrap();

    // empty search results are consumed without a fetch
    assert_eq!(state, RunState::Completed);
    assert!(collector.data.lock().unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_error_budget_aborts_run() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let automater = create_automater(&mock_server, &["A", "B"]);
    automater.set_max_error_count(2).unwrap();
    let collector = Arc::new(Collector::default());
    automater.add_output_listener(collector.clone());

    let state = automater.start().unwrap().await.unwrap();

    assert_eq!(state, RunState::Aborted);
    assert_eq!(collector.notices.lock().unwrap().len(), 2);
    assert_eq!(
        *collector.errors.lock().unwrap(),
        vec![MAX_ERRORS_EXCEEDED.to_string()]
    );
    assert!(!automater.is_running());
}

#[tokio::test]
#[traced_test]
async fn test_fetch_failure_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "esearchresult": { "count": "1", "idlist": ["7"] }
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    // first fetch fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_fetch(&mock_server, "7", "<record>7</record>\n").await;

    let automater = create_automater(&mock_server, &["NM_000546"]);
    let collector = Arc::new(Collector::default());
    automater.add_output_listener(collector.clone());

    let state = automater.start().unwrap().await.unwrap();

    assert_eq!(state, RunState::Completed);
    assert_eq!(collector.notices.lock().unwrap().len(), 1);
    assert_eq!(*collector.data.lock().unwrap(), vec!["<record>7</record>\n"]);
}

#[tokio::test]
#[traced_test]
async fn test_without_listeners_payloads_go_to_sink() {
    let mock_server = MockServer::start().await;
    mount_search(&mock_server, "A", &["1"]).await;
    mount_search(&mock_server, "B", &["2"]).await;
    mount_fetch(&mock_server, "1", "<record>1</record>\n").await;
    mount_fetch(&mock_server, "2", "<record>2</record>\n").await;

    let buffer = SharedBuffer::default();
    let automater = create_automater(&mock_server, &["A", "B"]).with_output_sink(buffer.clone());

    let state = automater.start().unwrap().await.unwrap();

    assert_eq!(state, RunState::Completed);
    let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert_eq!(written, "<record>1</record>\n<record>2</record>\n");
}
