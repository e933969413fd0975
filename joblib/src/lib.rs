mod actors;
pub mod config;
pub mod error;
pub mod job;
pub mod lifecycle;
pub mod output;
pub mod registry;
pub mod reporter;
pub mod spool;
pub mod supervisor;
pub mod types;

pub use config::{LaunchConfig, Paths};
pub use job::{Job, JobSpec, JobStatus};
pub use lifecycle::{Action, JobState};
pub use registry::JobRegistry;
pub use reporter::{CompletionReporter, FinalizeClient};

/// Tracing target for events that belong in the server's error log.
pub const ERROR_LOG_TARGET: &str = "jobserver::errors";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::spool::TailOptions;
    use crate::supervisor::SignalPlan;
    use crate::types::NO_OWNER;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    const TOKEN: &str = "session-1";

    #[derive(Default)]
    struct RecordingReporter {
        reports: Mutex<Vec<(String, String, JobStatus)>>,
    }

    impl RecordingReporter {
        fn reports(&self) -> Vec<(String, String, JobStatus)> {
            self.reports.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionReporter for RecordingReporter {
        async fn report(
            &self,
            token: &str,
            data_type: &str,
            status: &JobStatus,
        ) -> error::Result<()> {
            self.reports.lock().unwrap().push((
                token.to_string(),
                data_type.to_string(),
                status.clone(),
            ));
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        registry: JobRegistry,
        reporter: Arc<RecordingReporter>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir(dir.path().join(TOKEN)).unwrap();
            let reporter = Arc::new(RecordingReporter::default());
            let launch = LaunchConfig {
                program: "sh".into(),
                signals: SignalPlan::default(),
                tail: TailOptions {
                    chunk_size: 4096,
                    poll: Duration::from_millis(20),
                },
            };
            let registry =
                JobRegistry::new(Paths::under(dir.path()), launch, reporter.clone()).unwrap();
            Self {
                dir,
                registry,
                reporter,
            }
        }

        /// Write a shell script that the `sh` runner will execute as the workflow.
        fn workflow(&self, body: &str) -> String {
            let path = self
                .dir
                .path()
                .join(format!("wf-{}.sh", self.registry.len()));
            std::fs::write(&path, body).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn spec(&self, workflow_path: String) -> JobSpec {
            JobSpec {
                workflow_path,
                input: Bytes::from_static(br#"{"x": 1}"#),
                token: TOKEN.to_string(),
                data_type: "collection".to_string(),
                owner: NO_OWNER,
                name: None,
            }
        }

        async fn submit(&self, body: &str) -> Arc<Job> {
            let wf = self.workflow(body);
            self.registry.admit(self.spec(wf)).await.expect("admit")
        }
    }

    /// Wait for the reaper, then snapshot.
    async fn finished(job: &Job) -> JobStatus {
        tokio::time::timeout(Duration::from_secs(15), async {
            while !job.reaped() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("runner was never reaped");
        job.status().await
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn happy_path() {
        let fx = Fixture::new();
        let job = fx
            .submit("cat > /dev/null\necho started >&2\necho '{y: 2}'\n")
            .await;
        assert_eq!(job.id(), 0);
        assert_eq!(
            &job.history()[..2],
            &[JobState::Admitted, JobState::Running]
        );

        let status = finished(&job).await;
        assert_eq!(status.state, JobState::Success);
        assert_eq!(status.output, Some(json!({"y": 2})));
        assert_eq!(status.log.as_deref(), Some("started\n"));
        assert_eq!(status.input, json!({"x": 1}));
        assert_eq!(status.name, "Job 0");
        assert_eq!(status.owner, NO_OWNER);
        assert_eq!(
            job.history(),
            vec![JobState::Admitted, JobState::Running, JobState::Success]
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while fx.reporter.reports().is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("finalize was never reported");
        settle().await;
        let reports = fx.reporter.reports();
        assert_eq!(reports.len(), 1);
        let (token, data_type, reported) = &reports[0];
        assert_eq!(token, TOKEN);
        assert_eq!(data_type, "collection");
        assert_eq!(reported, &status);
    }

    #[tokio::test]
    async fn runner_failure() {
        let fx = Fixture::new();
        let job = fx
            .submit("cat > /dev/null\necho 'bad input' >&2\nexit 1\n")
            .await;
        let status = finished(&job).await;
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.output, None);
        assert!(status.log.unwrap().contains("bad input"));
        settle().await;
        assert!(fx.reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn unloadable_output_fails_the_job() {
        let fx = Fixture::new();
        let job = fx.submit("cat > /dev/null\necho '- just'\necho '- a list'\n").await;
        let status = finished(&job).await;
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.output, None);
        settle().await;
        assert!(fx.reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn pause_and_resume() {
        let fx = Fixture::new();
        let job = fx.submit("cat > /dev/null\nsleep 2\necho 'y: 2'\n").await;

        let paused = job.control(Action::Pause).await;
        assert_eq!(paused.state, JobState::Paused);
        assert_eq!(paused.log, None);
        assert_eq!(paused.output, None);
        settle().await;
        assert_eq!(job.state(), JobState::Paused);
        assert!(!job.reaped());

        // pausing twice is not a legal edge
        assert_eq!(job.control(Action::Pause).await.state, JobState::Paused);

        let resumed = job.control(Action::Resume).await;
        assert_eq!(resumed.state, JobState::Running);

        let status = finished(&job).await;
        assert_eq!(status.state, JobState::Success);
        assert_eq!(status.output, Some(json!({"y": 2})));
        assert_eq!(
            job.history(),
            vec![
                JobState::Admitted,
                JobState::Running,
                JobState::Paused,
                JobState::Running,
                JobState::Success
            ]
        );
    }

    #[tokio::test]
    async fn cancel() {
        let fx = Fixture::new();
        let job = fx
            .submit("cat > /dev/null\necho working >&2\nsleep 30\necho 'y: 2'\n")
            .await;
        let canceled = job.control(Action::Cancel).await;
        assert_eq!(canceled.state, JobState::Canceled);
        assert!(canceled.log.is_some(), "terminal snapshot without log");

        let status = finished(&job).await;
        assert_eq!(status.state, JobState::Canceled);
        assert_eq!(status.output, None);
        assert!(status.log.is_some());
        assert_eq!(
            job.history(),
            vec![JobState::Admitted, JobState::Running, JobState::Canceled]
        );
        settle().await;
        assert!(fx.reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn cancel_while_paused() {
        let fx = Fixture::new();
        let job = fx.submit("cat > /dev/null\nsleep 30\n").await;
        assert_eq!(job.control(Action::Pause).await.state, JobState::Paused);
        assert_eq!(job.control(Action::Cancel).await.state, JobState::Canceled);
        let status = finished(&job).await;
        assert_eq!(status.state, JobState::Canceled);
    }

    #[tokio::test]
    async fn requests_after_the_end_are_ignored() {
        let fx = Fixture::new();
        let job = fx.submit("cat > /dev/null\necho '{done: true}'\n").await;
        assert_eq!(finished(&job).await.state, JobState::Success);
        for action in [Action::Cancel, Action::Pause, Action::Resume] {
            let status = job.control(action).await;
            assert_eq!(status.state, JobState::Success);
            assert_eq!(status.output, Some(json!({"done": true})));
        }
    }

    #[tokio::test]
    async fn concurrent_tailers_see_the_whole_log() {
        let fx = Fixture::new();
        let job = fx
            .submit("cat > /dev/null\nprintf A >&2\nsleep 1\nprintf B >&2\necho 'y: 2'\n")
            .await;
        let (first, second) = tokio::join!(
            tokio::spawn(tail_all(Arc::clone(&job))),
            tokio::spawn(tail_all(Arc::clone(&job)))
        );
        assert_eq!(first.unwrap(), b"AB");
        assert_eq!(second.unwrap(), b"AB");

        let status = finished(&job).await;
        assert_eq!(status.log.as_deref(), Some("AB"));
    }

    #[tokio::test]
    async fn missing_working_directory_admits_nothing() {
        let fx = Fixture::new();
        let wf = fx.workflow("echo '{y: 2}'\n");
        let mut spec = fx.spec(wf);
        spec.token = "no-such-session".to_string();
        let err = fx.registry.admit(spec).await.unwrap_err();
        assert!(matches!(err, Error::Spawn(_)), "{err:?}");
        assert!(fx.registry.is_empty());
        let leftover = std::fs::read_dir(&fx.registry.paths().job_log_dir)
            .unwrap()
            .count();
        assert_eq!(leftover, 0);

        let job = fx.submit("cat > /dev/null\necho '{y: 2}'\n").await;
        assert_eq!(job.id(), 0);
    }

    #[tokio::test]
    async fn ids_follow_admission_order() {
        let fx = Fixture::new();
        let mut jobs = Vec::new();
        for _ in 0..3 {
            jobs.push(fx.submit("cat > /dev/null\necho '{y: 2}'\n").await);
        }
        let ids: Vec<_> = jobs.iter().map(|job| job.id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        let listed: Vec<_> = fx.registry.list().iter().map(|job| job.id()).collect();
        assert_eq!(listed, ids);
        assert_eq!(fx.registry.get(1).unwrap().id(), 1);
        assert!(matches!(fx.registry.get(3), Err(Error::NotFound(3))));
        for job in &jobs {
            finished(job).await;
        }
    }

    #[tokio::test]
    async fn submission_metadata_is_kept() {
        let fx = Fixture::new();
        let wf = fx.workflow("cat > /dev/null\necho '{y: 2}'\n");
        let mut spec = fx.spec(wf.clone());
        spec.name = Some("nmr batch".to_string());
        spec.owner = 12;
        spec.input = Bytes::from_static(b"not json");
        let job = fx.registry.admit(spec).await.unwrap();
        let status = finished(&job).await;
        assert_eq!(status.name, "nmr batch");
        assert_eq!(status.owner, 12);
        assert_eq!(status.run, wf);
        assert_eq!(status.input, json!("not json"));
        assert_eq!(job.work_dir(), fx.dir.path().join(TOKEN));
        assert!(job.log_path().starts_with(fx.dir.path().join("joblogs")));
    }

    async fn tail_all(job: Arc<Job>) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut tail = Box::pin(job.tail());
        while let Some(chunk) = tail.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        bytes
    }

    fn log_len(job: &Job) -> u64 {
        std::fs::metadata(job.log_path()).unwrap().len()
    }

    async fn wait_for_log(job: &Job) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while log_len(job) == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("runner never wrote to its log");
    }

    #[tokio::test]
    async fn tail_includes_output_written_after_cancel() {
        let fx = Fixture::new();
        let job = fx
            .submit(
                "trap 'sleep 0.5; echo bye >&2; exit 3' QUIT\n\
                 cat > /dev/null\n\
                 echo hi >&2\n\
                 while :; do sleep 0.1; done\n",
            )
            .await;
        let tail = tokio::spawn(tail_all(Arc::clone(&job)));
        wait_for_log(&job).await;

        assert_eq!(job.control(Action::Cancel).await.state, JobState::Canceled);
        let tailed = tail.await.unwrap();
        let status = finished(&job).await;
        assert_eq!(status.state, JobState::Canceled);
        let log = status.log.unwrap();
        assert!(log.starts_with("hi\n"), "{log:?}");
        assert!(log.ends_with("bye\n"), "{log:?}");
        assert_eq!(String::from_utf8(tailed).unwrap(), log);
    }

    #[tokio::test]
    async fn paused_runner_stops_writing() {
        let fx = Fixture::new();
        let job = fx
            .submit(
                "cat > /dev/null\n\
                 i=0\n\
                 while [ $i -lt 20 ]; do echo tick >&2; sleep 0.1; i=$((i+1)); done\n\
                 echo 'y: 2'\n",
            )
            .await;
        wait_for_log(&job).await;

        assert_eq!(job.control(Action::Pause).await.state, JobState::Paused);
        settle().await;
        let size = log_len(&job);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(log_len(&job), size, "log grew while paused");
        assert!(!job.reaped());

        assert_eq!(job.control(Action::Resume).await.state, JobState::Running);
        let status = finished(&job).await;
        assert_eq!(status.state, JobState::Success);
        assert_eq!(status.log.unwrap().matches("tick").count(), 20);
    }

    #[tokio::test]
    async fn concurrent_admissions_get_dense_ids() {
        let fx = Fixture::new();
        let wf = fx.workflow("cat > /dev/null\necho '{y: 2}'\n");
        let specs = (0..8).map(|n| {
            let mut spec = fx.spec(wf.clone());
            if n % 2 == 1 {
                spec.token = "no-such-session".to_string();
            }
            spec
        });
        let results =
            futures::future::join_all(specs.map(|spec| fx.registry.admit(spec))).await;
        assert_eq!(results.iter().filter(|result| result.is_err()).count(), 4);

        let mut ids: Vec<_> = results
            .iter()
            .filter_map(|result| result.as_ref().ok())
            .map(|job| job.id())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        for (index, job) in fx.registry.list().iter().enumerate() {
            assert_eq!(job.id(), index as u64);
        }
        for job in fx.registry.list() {
            finished(&job).await;
        }
    }
}
