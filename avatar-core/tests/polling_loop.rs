//! Loop cadence and failure-semantics tests, driven by scripted
//! collaborators and a paused tokio clock.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use avatar_core::{
    Artifact, ArtifactKind, AvatarError, AvatarRender, LoopConfig, PhotoHandle, PollingLoop,
    ProfilePublisher, WeatherSnapshot, WeatherSource,
};

fn snapshot() -> WeatherSnapshot {
    WeatherSnapshot {
        condition_code: "01d".to_string(),
        temperature_celsius: 23.4,
        humidity_percent: 46,
        wind_speed_mps: 0.67,
        retrieved_at: chrono::Utc::now(),
    }
}

fn weather_unavailable() -> AvatarError {
    AvatarError::WeatherUnavailable { attempts: 3, source: anyhow!("connection reset") }
}

/// Replays a fixed script of fetch outcomes, recording when each call
/// happened. Once the script runs out it cancels the loop.
struct ScriptedWeather {
    script: Arc<Mutex<VecDeque<Result<WeatherSnapshot, AvatarError>>>>,
    call_times: Arc<Mutex<Vec<Instant>>>,
    cancel_when_done: CancellationToken,
}

#[async_trait]
impl WeatherSource for ScriptedWeather {
    async fn fetch_current(&self) -> Result<WeatherSnapshot, AvatarError> {
        self.call_times.lock().unwrap().push(Instant::now());

        match self.script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => {
                self.cancel_when_done.cancel();
                Err(weather_unavailable())
            }
        }
    }
}

struct FakeRenderer {
    fail: bool,
}

#[async_trait]
impl AvatarRender for FakeRenderer {
    async fn render(&self, _snapshot: &WeatherSnapshot) -> Result<Artifact, AvatarError> {
        if self.fail {
            return Err(AvatarError::Render(anyhow!("missing icon asset")));
        }
        Ok(Artifact { path: PathBuf::from("avatar.png"), kind: ArtifactKind::Image })
    }
}

struct FakePublisher {
    uploads: Arc<Mutex<usize>>,
    fail: bool,
}

#[async_trait]
impl ProfilePublisher for FakePublisher {
    async fn upload(&self, _artifact: &Artifact) -> Result<PhotoHandle, AvatarError> {
        if self.fail {
            return Err(AvatarError::Publish { operation: "upload", source: anyhow!("503") });
        }
        *self.uploads.lock().unwrap() += 1;
        Ok(PhotoHandle { id: "remote-1".to_string() })
    }

    async fn current_photos(&self) -> Result<Vec<PhotoHandle>, AvatarError> {
        Ok(vec![PhotoHandle { id: "remote-0".to_string() }])
    }

    async fn delete(&self, _handles: &[PhotoHandle]) -> Result<(), AvatarError> {
        Ok(())
    }
}

struct Harness {
    call_times: Arc<Mutex<Vec<Instant>>>,
    uploads: Arc<Mutex<usize>>,
    cancel: CancellationToken,
    polling: PollingLoop,
}

fn harness(
    script: Vec<Result<WeatherSnapshot, AvatarError>>,
    render_fails: bool,
    publish_fails: bool,
) -> Harness {
    let call_times = Arc::new(Mutex::new(Vec::new()));
    let uploads = Arc::new(Mutex::new(0));
    let cancel = CancellationToken::new();

    let weather = ScriptedWeather {
        script: Arc::new(Mutex::new(script.into())),
        call_times: Arc::clone(&call_times),
        cancel_when_done: cancel.clone(),
    };
    let renderer = FakeRenderer { fail: render_fails };
    let publisher = FakePublisher { uploads: Arc::clone(&uploads), fail: publish_fails };

    let polling = PollingLoop::new(
        Box::new(weather),
        Box::new(renderer),
        Box::new(publisher),
        LoopConfig::default(),
        cancel.clone(),
    );

    Harness { call_times, uploads, cancel, polling }
}

#[tokio::test(start_paused = true)]
async fn loop_sleeps_600s_after_success_and_60s_after_weather_failure() {
    let h = harness(
        vec![Ok(snapshot()), Err(weather_unavailable()), Ok(snapshot())],
        false,
        false,
    );

    h.polling.run().await.expect("loop must end cleanly after cancellation");

    let times = h.call_times.lock().unwrap();
    assert_eq!(times.len(), 4, "three scripted cycles plus the exhausted call");
    assert_eq!(times[1] - times[0], Duration::from_secs(600));
    assert_eq!(times[2] - times[1], Duration::from_secs(60));
    assert_eq!(times[3] - times[2], Duration::from_secs(600));

    assert_eq!(*h.uploads.lock().unwrap(), 2, "both successful cycles published");
}

#[tokio::test(start_paused = true)]
async fn render_failure_aborts_the_loop() {
    let h = harness(vec![Ok(snapshot())], true, false);

    let err = h.polling.run().await.unwrap_err();

    assert!(matches!(err, AvatarError::Render(_)));
    assert_eq!(*h.uploads.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn publish_failure_aborts_the_loop() {
    let h = harness(vec![Ok(snapshot())], false, true);

    let err = h.polling.run().await.unwrap_err();

    assert!(matches!(err, AvatarError::Publish { operation: "upload", .. }));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_inter_cycle_sleep() {
    let h = harness(vec![Ok(snapshot())], false, false);
    let cancel = h.cancel.clone();

    let handle = tokio::spawn(h.polling.run());

    // Let the first cycle finish, then cancel one second into the
    // ten-minute sleep.
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    handle
        .await
        .expect("loop task must not panic")
        .expect("cancellation must end the loop cleanly");

    assert_eq!(h.call_times.lock().unwrap().len(), 1);
    assert_eq!(*h.uploads.lock().unwrap(), 1);
}
