//! Scripted in-memory backend for the explorer tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use rq_core::wire::{
    AggregateRequest, AggregateResponse, SearchRequest, SearchResponse, TimelineRequest,
    TimelineResponse, TimelineWireBucket,
};
use rq_core::AggregationBucket;

use crate::backend::SearchBackend;
use crate::error::FetchError;

#[derive(Default)]
struct Script {
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    fail_aggregations: bool,
    searches: Vec<SearchRequest>,
    aggregations: Vec<AggregateRequest>,
    timelines: Vec<TimelineRequest>,
    completed: Vec<String>,
}

pub(crate) struct ScriptedBackend {
    total: u64,
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            script: Mutex::new(Script::default()),
        }
    }

    pub fn delay_query(&self, query: &str, delay: Duration) {
        self.script.lock().unwrap().delays.insert(query.to_string(), delay);
    }

    pub fn fail_query(&self, query: &str) {
        self.script.lock().unwrap().failing.insert(query.to_string());
    }

    pub fn fail_aggregations(&self) {
        self.script.lock().unwrap().fail_aggregations = true;
    }

    pub fn search_count(&self) -> usize {
        self.script.lock().unwrap().searches.len()
    }

    pub fn aggregation_count(&self) -> usize {
        self.script.lock().unwrap().aggregations.len()
    }

    pub fn timeline_count(&self) -> usize {
        self.script.lock().unwrap().timelines.len()
    }

    pub fn last_search(&self) -> Option<SearchRequest> {
        self.script.lock().unwrap().searches.last().cloned()
    }

    /// Queries whose search ran to completion on the backend side.
    pub fn completed_queries(&self) -> Vec<String> {
        self.script.lock().unwrap().completed.clone()
    }

    pub fn page(&self, case_id: &str, query: &str, from: usize, size: usize) -> SearchResponse {
        let end = (from + size).min(self.total as usize);
        let hits = (from..end)
            .map(|n| {
                json!({
                    "@timestamp": format!("2024-05-01T00:{:02}:{:02}Z", (n / 60) % 60, n % 60),
                    "_id": format!("{}-{}", case_id, n),
                    "source": {"parser": "parse_evtx"},
                    "message": format!("{} event {} ({})", case_id, n, query),
                    "event": {"type": if n % 2 == 0 { "file" } else { "process" }},
                    "process": {"name": "svchost.exe"},
                    "_score": 1.0
                })
            })
            .collect();
        SearchResponse {
            hits,
            total: self.total,
            took: Some(3),
        }
    }
}

#[async_trait::async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, FetchError> {
        let (delay, failing) = {
            let mut script = self.script.lock().unwrap();
            script.searches.push(request.clone());
            (
                script.delays.get(&request.query).copied(),
                script.failing.contains(&request.query),
            )
        };
        tokio::time::sleep(delay.unwrap_or(Duration::from_millis(5))).await;
        self.script.lock().unwrap().completed.push(request.query.clone());

        if failing {
            return Err(FetchError::Backend {
                status: 500,
                message: "index unavailable".into(),
            });
        }
        Ok(self.page(&request.case_id, &request.query, request.from, request.size))
    }

    async fn aggregate(
        &self,
        request: AggregateRequest,
    ) -> Result<AggregateResponse, FetchError> {
        let failing = {
            let mut script = self.script.lock().unwrap();
            script.aggregations.push(request);
            script.fail_aggregations
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        if failing {
            return Err(FetchError::Decode("no buckets in aggregation response".into()));
        }
        let bucket = |key: &str, count| AggregationBucket {
            key: key.to_string(),
            count,
        };
        Ok(AggregateResponse {
            buckets: vec![bucket("file", 69), bucket("process", 68), bucket("registry", 0)],
        })
    }

    async fn timeline(&self, request: TimelineRequest) -> Result<TimelineResponse, FetchError> {
        let interval = request.interval.clone();
        self.script.lock().unwrap().timelines.push(request);
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(TimelineResponse {
            interval: Some(interval),
            buckets: ["00", "01", "02"]
                .iter()
                .map(|h| TimelineWireBucket {
                    timestamp: format!("2024-05-01T{}:00:00Z", h),
                    count: 40,
                })
                .collect(),
        })
    }
}
