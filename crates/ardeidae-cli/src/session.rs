//! A booted dashboard: bus, host link, pipeline, views and cockpit.

use std::sync::Arc;
use std::time::Duration;

use ardeidae_cockpit::CockpitServer;
use ardeidae_middleware::{EventBus, HostLink, SimulatedHost, WsHostLink};
use ardeidae_runtime::{
    BusSceneView, DashboardHandle, DashboardPipeline, PipelineConfig, ViewConfig, ViewHandle,
    spawn_view,
};
use ardeidae_types::ViewFrame;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Upper bound on the host availability probe.
pub const HOST_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of log lines the REPL shows.
const LOG_VIEWPORT_HEIGHT: usize = 20;

/// How the host link was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    Simulated,
    Connected,
    Offline,
}

pub struct Session {
    host_mode: HostMode,
    dashboard: DashboardHandle,
    views: Mutex<Vec<ViewHandle>>,
    cockpit: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Select the host, then start the pipeline, the views and the cockpit.
    pub async fn boot(cfg: &Config) -> Self {
        let bus = Arc::new(EventBus::default());

        let (host, host_mode): (Arc<dyn HostLink>, HostMode) = if cfg.dashboard.simulate {
            (Arc::new(SimulatedHost::new(Arc::clone(&bus))), HostMode::Simulated)
        } else {
            let host = WsHostLink::probe(&cfg.dashboard.host_url, Arc::clone(&bus), HOST_PROBE_TIMEOUT).await;
            let mode = if host.is_available() {
                HostMode::Connected
            } else {
                HostMode::Offline
            };
            (host, mode)
        };
        info!(?host_mode, "host link selected");

        let dashboard = DashboardPipeline::new(
            PipelineConfig {
                calibration_mode: cfg.dashboard.calibration_mode,
                connect_markers: vec![cfg.dashboard.connect_marker.clone()],
                log_viewport_height: LOG_VIEWPORT_HEIGHT,
            },
            Arc::clone(&bus),
            host,
        )
        .spawn();

        let views = ViewConfig::defaults(cfg.dashboard.assets_dir.clone())
            .into_iter()
            .map(|view_cfg| {
                let output = BusSceneView::new(Arc::clone(&bus), &view_cfg.name);
                spawn_view(view_cfg, dashboard.subscribe_orientation(), output, cfg.dashboard.frame_rate)
            })
            .collect();

        let cockpit = CockpitServer::new(Arc::clone(&bus))
            .with_port(cfg.dashboard.webui_port)
            .with_orientation(dashboard.subscribe_orientation())
            .with_dashboard(dashboard.clone());
        let cockpit = tokio::spawn(async move {
            if let Err(e) = cockpit.run().await {
                warn!(error = %e, "cockpit stopped");
            }
        });

        Self {
            host_mode,
            dashboard,
            views: Mutex::new(views),
            cockpit: std::sync::Mutex::new(Some(cockpit)),
        }
    }

    pub fn host_mode(&self) -> HostMode {
        self.host_mode
    }

    pub fn dashboard(&self) -> &DashboardHandle {
        &self.dashboard
    }

    /// Latest frame of every live view.
    pub async fn latest_frames(&self) -> Vec<ViewFrame> {
        self.views.lock().await.iter().map(ViewHandle::latest_frame).collect()
    }

    /// Stop every view, the pipeline and the cockpit.  Safe to call twice.
    pub async fn dispose(&self) {
        let views: Vec<ViewHandle> = self.views.lock().await.drain(..).collect();
        for view in views {
            let name = view.name().to_string();
            match view.stop().await {
                Ok(()) => debug!(view = %name, "view disposed"),
                Err(e) => warn!(view = %name, error = %e, "view did not stop cleanly"),
            }
        }

        if let Err(e) = self.dashboard.shutdown().await {
            warn!(error = %e, "pipeline did not stop cleanly");
        }

        if let Ok(mut cockpit) = self.cockpit.lock() {
            if let Some(task) = cockpit.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardeidae_types::Axis;
    use tokio::net::TcpListener;

    fn test_config(assets: &std::path::Path) -> Config {
        let mut cfg = Config::default();
        cfg.dashboard.simulate = true;
        cfg.dashboard.webui_port = 0;
        cfg.dashboard.frame_rate = 120;
        cfg.dashboard.assets_dir = assets.to_path_buf();
        cfg
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 2 s");
    }

    #[tokio::test]
    async fn simulated_session_runs_end_to_end() {
        let assets = tempfile::tempdir().unwrap();
        std::fs::write(assets.path().join("handLowpoly.glb"), b"glTF").unwrap();
        std::fs::write(assets.path().join("lissajous.glb"), b"glTF").unwrap();

        let session = Session::boot(&test_config(assets.path())).await;
        assert_eq!(session.host_mode(), HostMode::Simulated);

        let dashboard = session.dashboard().clone();
        dashboard.start_sensors().await.unwrap();
        eventually(|| {
            let d = dashboard.clone();
            async move { d.status().await.map(|s| s.ring_connected).unwrap_or(false) }
        })
        .await;
        eventually(|| {
            let d = dashboard.clone();
            async move { d.orientation().reading(Axis::Y).is_some() }
        })
        .await;

        let snapshot = dashboard.calibrate().await.unwrap();
        assert_eq!(dashboard.orientation().calibration_epoch, 1);
        assert_eq!(dashboard.orientation().baseline, snapshot);

        eventually(|| async { session.latest_frames().await.iter().all(|f| f.content_loaded && f.frame > 0) }).await;
        let names: Vec<String> = session.latest_frames().await.into_iter().map(|f| f.view).collect();
        assert_eq!(names, vec!["hand", "sensor"]);

        session.dispose().await;
        assert!(session.latest_frames().await.is_empty());
        assert!(dashboard.status().await.is_err());
        session.dispose().await;
    }

    #[tokio::test]
    async fn unreachable_host_boots_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let assets = tempfile::tempdir().unwrap();
        let mut cfg = test_config(assets.path());
        cfg.dashboard.simulate = false;
        cfg.dashboard.host_url = format!("ws://{addr}");

        let session = Session::boot(&cfg).await;
        assert_eq!(session.host_mode(), HostMode::Offline);

        let dashboard = session.dashboard();
        dashboard.start_sensors().await.unwrap();
        let status = dashboard.status().await.unwrap();
        assert!(!status.host_available);
        assert!(!status.sensors_started);
        assert_eq!(dashboard.log_len().await.unwrap(), 0);

        session.dispose().await;
    }
}
