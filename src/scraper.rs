use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use headless_chrome::{Browser, LaunchOptions};
use serde_json::Value;
use tokio::task;
use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::errors::GenerationError;

/// The background call the set page makes for its flashcard payload; also the
/// URL a human fetches manually when automation fails.
pub fn data_endpoint_url(set_id: &str) -> String {
    format!(
        "https://quizlet.com/webapi/3.9/studiable-item-documents\
         ?filters%5BstudiableContainerId%5D={set_id}\
         &filters%5BstudiableContainerType%5D=1&perPage=500&page=1"
    )
}

fn set_page_url(set_id: &str) -> String {
    format!("https://quizlet.com/{set_id}/")
}

#[derive(Debug, Clone)]
struct CapturedResponse {
    /// HTTP status of the data call; 0 when only the rendered body text was
    /// recoverable.
    status: i64,
    body: String,
}

/// Retrieves a set's raw flashcard payload by driving a headless browser.
///
/// Primary path: navigate to the public set page and intercept the
/// `studiable-item-documents` background call. Fallback: navigate the same
/// authenticated tab directly to the data endpoint. Either way the configured
/// session cookie and desktop user agent ride along, which keeps most bot
/// challenges away.
#[derive(Clone)]
pub struct FlashcardScraper {
    config: ScraperConfig,
}

impl FlashcardScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    /// Fetch the raw payload for one set, bounded by the configured deadline.
    /// The browser lives entirely inside the blocking task and is dropped on
    /// every exit path, including timeout or cancellation of this future.
    pub async fn scrape(&self, set_id: &str) -> Result<Value, GenerationError> {
        let api_url = data_endpoint_url(set_id);
        let set_url = set_page_url(set_id);
        let deadline = Duration::from_secs(self.config.timeout_secs);

        info!(set_id = %set_id, "Starting automated flashcard retrieval");

        let config = self.config.clone();
        let task_api_url = api_url.clone();
        let handle =
            task::spawn_blocking(move || fetch_set_payload(&config, &set_url, &task_api_url));

        let capture = match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => {
                return Err(GenerationError::ScraperFailed {
                    reason: format!("scraper task failed: {}", join_err),
                    api_url,
                });
            }
            Err(_) => {
                return Err(GenerationError::ScraperFailed {
                    reason: format!("scrape exceeded {}s deadline", deadline.as_secs()),
                    api_url,
                });
            }
        };

        classify_capture(capture, set_id, &api_url)
    }
}

/// Blocking browser session. Runs on the blocking thread pool; the `Browser`
/// handle owns the Chrome process and tears it down when this function
/// returns, whatever the path out.
fn fetch_set_payload(
    config: &ScraperConfig,
    set_url: &str,
    api_url: &str,
) -> Result<CapturedResponse, GenerationError> {
    let scraper_failed = |reason: String| GenerationError::ScraperFailed {
        reason,
        api_url: api_url.to_string(),
    };

    let options = LaunchOptions::default_builder()
        .headless(true)
        .idle_browser_timeout(Duration::from_secs(config.timeout_secs + 30))
        .build()
        .map_err(|e| scraper_failed(format!("invalid browser launch options: {}", e)))?;

    let browser =
        Browser::new(options).map_err(|e| scraper_failed(format!("browser launch failed: {}", e)))?;
    let tab = browser
        .new_tab()
        .map_err(|e| scraper_failed(format!("could not open tab: {}", e)))?;

    tab.set_user_agent(&config.user_agent, None, None)
        .map_err(|e| scraper_failed(format!("could not set user agent: {}", e)))?;

    if let Some(cookie) = &config.session_cookie {
        let mut headers = HashMap::new();
        headers.insert("Cookie", cookie.as_str());
        tab.set_extra_http_headers(headers)
            .map_err(|e| scraper_failed(format!("could not set session cookie: {}", e)))?;
    }

    let captured: Arc<Mutex<Option<CapturedResponse>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    tab.register_response_handling(
        "studiable-item-documents",
        Box::new(move |params, fetch_body| {
            if !params.response.url.contains("studiable-item-documents") {
                return;
            }
            let status = params.response.status as i64;
            if let Ok(body) = fetch_body() {
                if body.base_64_encoded {
                    return;
                }
                let mut slot = sink.lock().unwrap();
                if slot.is_none() {
                    *slot = Some(CapturedResponse {
                        status,
                        body: body.body,
                    });
                }
            }
        }),
    )
    .map_err(|e| scraper_failed(format!("could not register response handler: {}", e)))?;

    // Primary path: the set page issues the data call in the background.
    let interception_budget = Duration::from_secs(config.timeout_secs / 2 + 1);
    match tab.navigate_to(set_url) {
        Ok(_) => {
            let _ = tab.wait_until_navigated();
            if let Some(capture) = wait_for_capture(&captured, interception_budget) {
                debug!(status = capture.status, "Intercepted data call on set page");
                return Ok(capture);
            }
        }
        Err(e) => {
            debug!(error = %e, "Set page navigation failed; trying the data endpoint directly");
        }
    }

    // Fallback: load the data endpoint in the same browser context.
    info!("Interception yielded nothing; navigating directly to the data endpoint");
    tab.navigate_to(api_url)
        .map_err(|e| scraper_failed(format!("data endpoint navigation failed: {}", e)))?;
    tab.wait_until_navigated()
        .map_err(|e| scraper_failed(format!("data endpoint load failed: {}", e)))?;

    // The handler usually still sees the direct navigation's response.
    if let Some(capture) = wait_for_capture(&captured, Duration::from_secs(2)) {
        debug!(status = capture.status, "Captured data endpoint response");
        return Ok(capture);
    }

    // Last resort: read the rendered body text (status unknown).
    let body_text = tab
        .evaluate("document.body.innerText", false)
        .ok()
        .and_then(|result| result.value)
        .and_then(|value| value.as_str().map(str::to_string))
        .ok_or_else(|| scraper_failed("could not read data endpoint response body".to_string()))?;

    Ok(CapturedResponse {
        status: 0,
        body: body_text,
    })
}

fn wait_for_capture(
    captured: &Arc<Mutex<Option<CapturedResponse>>>,
    budget: Duration,
) -> Option<CapturedResponse> {
    let deadline = Instant::now() + budget;
    loop {
        if let Some(capture) = captured.lock().unwrap().take() {
            return Some(capture);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(100));
    }
}

/// Maps platform HTTP status onto domain errors and parses the body. Anything
/// that is not a clean platform answer is `ScraperFailed` carrying the data
/// endpoint URL, because the manual-paste fallback needs it.
fn classify_capture(
    capture: CapturedResponse,
    set_id: &str,
    api_url: &str,
) -> Result<Value, GenerationError> {
    match capture.status {
        404 => {
            return Err(GenerationError::SetNotFound {
                set_id: set_id.to_string(),
            });
        }
        403 => {
            return Err(GenerationError::SetPrivate {
                set_id: set_id.to_string(),
            });
        }
        0 | 200..=299 => {}
        other => {
            return Err(GenerationError::ScraperFailed {
                reason: format!("data endpoint returned HTTP {}", other),
                api_url: api_url.to_string(),
            });
        }
    }

    serde_json::from_str::<Value>(&capture.body).map_err(|_| GenerationError::ScraperFailed {
        reason: "data endpoint response is not JSON (likely a bot challenge page)".to_string(),
        api_url: api_url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_endpoint_url_embeds_set_id() {
        let url = data_endpoint_url("123456789");
        assert!(url.starts_with("https://quizlet.com/webapi/3.9/studiable-item-documents"));
        assert!(url.contains("filters%5BstudiableContainerId%5D=123456789"));
    }

    #[test]
    fn test_404_classifies_as_set_not_found() {
        let capture = CapturedResponse {
            status: 404,
            body: String::new(),
        };

        let result = classify_capture(capture, "42", "https://quizlet.com/webapi/x");
        assert!(matches!(result, Err(GenerationError::SetNotFound { set_id }) if set_id == "42"));
    }

    #[test]
    fn test_403_classifies_as_set_private() {
        let capture = CapturedResponse {
            status: 403,
            body: String::new(),
        };

        let result = classify_capture(capture, "42", "https://quizlet.com/webapi/x");
        assert!(matches!(result, Err(GenerationError::SetPrivate { .. })));
    }

    #[test]
    fn test_other_status_is_scraper_failed_with_recovery_url() {
        let capture = CapturedResponse {
            status: 500,
            body: String::new(),
        };

        match classify_capture(capture, "42", "https://quizlet.com/webapi/x") {
            Err(GenerationError::ScraperFailed { api_url, reason }) => {
                assert_eq!(api_url, "https://quizlet.com/webapi/x");
                assert!(reason.contains("500"));
            }
            other => panic!("expected ScraperFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_success_status_parses_body() {
        let capture = CapturedResponse {
            status: 200,
            body: r#"{"responses": []}"#.to_string(),
        };

        let value = classify_capture(capture, "42", "https://quizlet.com/webapi/x").unwrap();
        assert!(value.get("responses").is_some());
    }

    #[test]
    fn test_unknown_status_with_json_body_parses() {
        let capture = CapturedResponse {
            status: 0,
            body: r#"{"responses": []}"#.to_string(),
        };

        assert!(classify_capture(capture, "42", "https://quizlet.com/webapi/x").is_ok());
    }

    #[test]
    fn test_html_body_is_scraper_failed() {
        let capture = CapturedResponse {
            status: 200,
            body: "<html><body>Are you a robot?</body></html>".to_string(),
        };

        let result = classify_capture(capture, "42", "https://quizlet.com/webapi/x");
        assert!(matches!(result, Err(GenerationError::ScraperFailed { .. })));
    }
}
