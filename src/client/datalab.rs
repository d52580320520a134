// Naver DataLab search-trend client
use crate::client::MeasurementClient;
use crate::config::{AppConfig, Credentials};
use crate::model::{DateRange, FetchError, KeywordGroup, Measurement, Segment};
use crate::utils::{format_date, parse_period};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const TIME_UNIT: &str = "month";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    start_date: String,
    end_date: String,
    time_unit: &'static str,
    keyword_groups: Vec<RequestGroup<'a>>,
    device: &'a str,
    ages: &'a [String],
    gender: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGroup<'a> {
    group_name: &'a str,
    keywords: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ResponseGroup>,
}

#[derive(Debug, Deserialize)]
struct ResponseGroup {
    title: String,
    #[serde(default)]
    data: Vec<ResponsePoint>,
}

#[derive(Debug, Deserialize)]
struct ResponsePoint {
    period: String,
    ratio: f64,
}

pub struct DataLabClient {
    client: Client,
    endpoint: String,
    credentials: Credentials,
    ages: Vec<String>,
    device: String,
}

impl DataLabClient {
    pub fn new(config: &AppConfig, credentials: Credentials) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("trend-stitcher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport { cause: e.to_string() })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            credentials,
            ages: config.ages.clone(),
            device: config.device.clone(),
        })
    }

    fn build_request<'a>(
        &'a self,
        batch: &'a [KeywordGroup],
        segment: Segment,
        range: DateRange,
    ) -> SearchRequest<'a> {
        SearchRequest {
            start_date: format_date(range.start),
            end_date: format_date(range.end),
            time_unit: TIME_UNIT,
            keyword_groups: batch
                .iter()
                .map(|g| RequestGroup {
                    group_name: g.name(),
                    keywords: g.terms(),
                })
                .collect(),
            device: &self.device,
            ages: &self.ages,
            gender: segment.api_code(),
        }
    }
}

#[async_trait::async_trait]
impl MeasurementClient for DataLabClient {
    async fn fetch(
        &self,
        batch: &[KeywordGroup],
        segment: Segment,
        range: DateRange,
    ) -> Result<Vec<Measurement>, FetchError> {
        let body = self.build_request(batch, segment, range);
        let start = Instant::now();
        debug!("DataLab request - segment={}, groups={}", segment, batch.len());

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Naver-Client-Id", &self.credentials.client_id)
            .header("X-Naver-Client-Secret", &self.credentials.client_secret)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                cause: if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Transport { cause: e.to_string() })?;

        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        let measurements = parse_response(&text, segment);
        info!(
            "DataLab fetch completed - segment={}, duration={:.2}s, rows={}",
            segment,
            start.elapsed().as_secs_f32(),
            measurements.len()
        );
        Ok(measurements)
    }
}

/// Flattens a successful response body. Malformed payloads yield no rows.
fn parse_response(body: &str, segment: Segment) -> Vec<Measurement> {
    let response: SearchResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            warn!("Malformed DataLab payload for segment {}: {}", segment, e);
            return Vec::new();
        }
    };

    let mut measurements = Vec::new();
    for group in response.results {
        for point in group.data {
            let Some(date) = parse_period(&point.period) else {
                warn!("Unparseable period {:?} for group {:?}", point.period, group.title);
                continue;
            };
            measurements.push(Measurement {
                date,
                group_name: group.title.clone(),
                value: point.ratio,
                segment,
            });
        }
    }
    measurements
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn client() -> DataLabClient {
        let credentials = Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        };
        DataLabClient::new(&AppConfig::default(), credentials).unwrap()
    }

    #[test]
    fn request_body_matches_upstream_schema() {
        let client = client();
        let batch = vec![
            KeywordGroup::new("A", ["A", "a"]).unwrap(),
            KeywordGroup::new("B", ["B"]).unwrap(),
        ];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap();

        let body = serde_json::to_value(client.build_request(&batch, Segment::Female, range)).unwrap();
        assert_eq!(body["startDate"], "2024-01-01");
        assert_eq!(body["endDate"], "2024-12-31");
        assert_eq!(body["timeUnit"], "month");
        assert_eq!(body["gender"], "f");
        assert_eq!(body["device"], "");
        assert_eq!(body["ages"], serde_json::json!(["3", "4", "5", "6", "7"]));
        assert_eq!(
            body["keywordGroups"],
            serde_json::json!([
                {"groupName": "A", "keywords": ["A", "a"]},
                {"groupName": "B", "keywords": ["B"]}
            ])
        );
    }

    #[test]
    fn parses_results_into_measurements() {
        let body = r#"{
            "startDate": "2024-01-01", "endDate": "2024-02-29", "timeUnit": "month",
            "results": [
                {"title": "A", "keywords": ["A"], "data": [
                    {"period": "2024-01-01", "ratio": 100},
                    {"period": "2024-02-01", "ratio": 42.5}
                ]},
                {"title": "B", "keywords": ["B"], "data": []}
            ]
        }"#;
        let rows = parse_response(body, Segment::Male);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].group_name, "A");
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(rows[1].value, 42.5);
        assert!(rows.iter().all(|m| m.segment == Segment::Male));
    }

    #[test]
    fn malformed_or_empty_payload_yields_no_rows() {
        assert!(parse_response("not json", Segment::Male).is_empty());
        assert!(parse_response("{}", Segment::Male).is_empty());
        assert!(parse_response(r#"{"results": []}"#, Segment::Female).is_empty());
    }

    #[test]
    fn bad_periods_are_dropped() {
        let body = r#"{"results": [{"title": "A", "data": [
            {"period": "soon", "ratio": 1.0},
            {"period": "2024-03-01", "ratio": 2.0}
        ]}]}"#;
        let rows = parse_response(body, Segment::All);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 2.0);
    }

    /// Answers a single request on a local port with the given status line and body.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let length = headers
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/v1/datalab/search", addr)
    }

    fn client_for(endpoint: String) -> DataLabClient {
        let config = AppConfig {
            endpoint,
            request_timeout_seconds: 5,
            ..AppConfig::default()
        };
        let credentials = Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        };
        DataLabClient::new(&config, credentials).unwrap()
    }

    #[tokio::test]
    async fn error_status_is_an_upstream_error_with_body() {
        let endpoint = serve_once(
            "HTTP/1.1 401 Unauthorized",
            r#"{"errorMessage":"Authentication failed","errorCode":"024"}"#,
        )
        .await;
        let client = client_for(endpoint);
        let batch = vec![KeywordGroup::new("A", ["A"]).unwrap()];
        let range = AppConfig::default().date_range().unwrap();

        match client.fetch(&batch, Segment::Male, range).await {
            Err(FetchError::Upstream { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Authentication failed"), "{body}");
            }
            other => panic!("unexpected fetch result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_with_junk_body_is_empty() {
        let endpoint = serve_once("HTTP/1.1 200 OK", "<html>not json</html>").await;
        let client = client_for(endpoint);
        let batch = vec![KeywordGroup::new("A", ["A"]).unwrap()];
        let range = AppConfig::default().date_range().unwrap();

        let rows = client.fetch(&batch, Segment::Female, range).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn success_body_is_parsed_through_fetch() {
        let endpoint = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"results":[{"title":"A","keywords":["A"],"data":[{"period":"2024-01-01","ratio":100.0}]}]}"#,
        )
        .await;
        let client = client_for(endpoint);
        let batch = vec![KeywordGroup::new("A", ["A"]).unwrap()];
        let range = AppConfig::default().date_range().unwrap();

        let rows = client.fetch(&batch, Segment::Male, range).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group_name, "A");
        assert_eq!(rows[0].segment, Segment::Male);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let config = AppConfig {
            endpoint: "http://127.0.0.1:9/v1/datalab/search".into(),
            request_timeout_seconds: 2,
            ..AppConfig::default()
        };
        let credentials = Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        };
        let client = DataLabClient::new(&config, credentials).unwrap();
        let batch = vec![KeywordGroup::new("A", ["A"]).unwrap()];
        let range = config.date_range().unwrap();
        let err = client.fetch(&batch, Segment::Male, range).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
