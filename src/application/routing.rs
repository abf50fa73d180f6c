//! Audio route setup use case
//!
//! Creates a combined sink mirroring into the chosen output, moves the
//! player's stream into it and exposes the sink's monitor as capture device.

use tracing::info;

use super::ports::{AudioRouter, RoutingError, SinkModuleId, StreamId};

/// What the route setup needs to know about the player and the sink
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Real output the combined sink mirrors into
    pub slave_sink: String,
    /// Name the combined sink is created with
    pub combined_sink: String,
    /// `media.name` of the player's stream input
    pub media_name: String,
}

/// A combined sink that is loaded and carrying the player's stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRoute {
    pub module: SinkModuleId,
    pub stream: StreamId,
    pub combined_sink: String,
}

impl ActiveRoute {
    /// Capture device mirroring everything played into the combined sink
    pub fn monitor_device(&self) -> String {
        format!("{}.monitor", self.combined_sink)
    }
}

/// Route setup use case
pub struct RouteSetup<R: AudioRouter> {
    router: R,
}

impl<R: AudioRouter> RouteSetup<R> {
    pub fn new(router: R) -> Self {
        Self { router }
    }

    pub async fn list_sinks(&self) -> Result<Vec<String>, RoutingError> {
        let sinks = self.router.list_sinks().await?;
        if sinks.is_empty() {
            return Err(RoutingError::NoSinks);
        }
        Ok(sinks)
    }

    /// Find the player first so nothing is loaded when it is not running.
    pub async fn establish(&self, request: &RouteRequest) -> Result<ActiveRoute, RoutingError> {
        let stream = self.router.find_player_stream(&request.media_name).await?;
        let module = self
            .router
            .create_combined_sink(&request.combined_sink, &request.slave_sink)
            .await?;

        if let Err(e) = self
            .router
            .move_stream(&stream, &request.combined_sink)
            .await
        {
            let _ = self.router.unload_sink(&module).await;
            return Err(e);
        }

        info!(
            stream = %stream,
            module = %module,
            sink = %request.combined_sink,
            slave = %request.slave_sink,
            "player routed through combined sink"
        );

        Ok(ActiveRoute {
            module,
            stream,
            combined_sink: request.combined_sink.clone(),
        })
    }

    /// Unload the combined sink. PulseAudio moves the stream back on its own.
    pub async fn teardown(&self, route: &ActiveRoute) -> Result<(), RoutingError> {
        self.router.unload_sink(&route.module).await?;
        info!(module = %route.module, "combined sink unloaded");
        Ok(())
    }
}

/// Resolve a sink choice typed by the user: empty means the first sink,
/// otherwise an index into `sinks` or one of the names.
pub fn choose_sink(sinks: &[String], answer: &str) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return sinks.first().cloned();
    }
    if let Ok(index) = answer.parse::<usize>() {
        return sinks.get(index).cloned();
    }
    sinks.iter().find(|s| s.as_str() == answer).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRouter {
        calls: Mutex<Vec<String>>,
        player_running: bool,
        fail_move: bool,
    }

    impl RecordingRouter {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AudioRouter for RecordingRouter {
        async fn list_sinks(&self) -> Result<Vec<String>, RoutingError> {
            Ok(vec!["alsa_output.analog".to_string(), "bluez_sink.headset".to_string()])
        }

        async fn find_player_stream(&self, media_name: &str) -> Result<StreamId, RoutingError> {
            self.calls.lock().unwrap().push(format!("find {}", media_name));
            if self.player_running {
                Ok(StreamId("42".to_string()))
            } else {
                Err(RoutingError::StreamNotFound(media_name.to_string()))
            }
        }

        async fn create_combined_sink(
            &self,
            name: &str,
            slave: &str,
        ) -> Result<SinkModuleId, RoutingError> {
            self.calls.lock().unwrap().push(format!("create {} {}", name, slave));
            Ok(SinkModuleId("536870913".to_string()))
        }

        async fn move_stream(&self, stream: &StreamId, sink: &str) -> Result<(), RoutingError> {
            self.calls.lock().unwrap().push(format!("move {} {}", stream, sink));
            if self.fail_move {
                Err(RoutingError::CommandFailed {
                    command: "move-sink-input".to_string(),
                    message: "No such entity".to_string(),
                })
            } else {
                Ok(())
            }
        }

        async fn unload_sink(&self, module: &SinkModuleId) -> Result<(), RoutingError> {
            self.calls.lock().unwrap().push(format!("unload {}", module));
            Ok(())
        }
    }

    fn request() -> RouteRequest {
        RouteRequest {
            slave_sink: "alsa_output.analog".to_string(),
            combined_sink: "drainify_combined".to_string(),
            media_name: "Spotify".to_string(),
        }
    }

    #[tokio::test]
    async fn establish_routes_player_stream() {
        let setup = RouteSetup::new(RecordingRouter {
            player_running: true,
            ..Default::default()
        });

        let route = setup.establish(&request()).await.unwrap();
        assert_eq!(route.monitor_device(), "drainify_combined.monitor");
        assert_eq!(
            setup.router.calls(),
            vec![
                "find Spotify",
                "create drainify_combined alsa_output.analog",
                "move 42 drainify_combined",
            ]
        );
    }

    #[tokio::test]
    async fn missing_player_loads_nothing() {
        let setup = RouteSetup::new(RecordingRouter::default());

        let err = setup.establish(&request()).await.unwrap_err();
        assert!(matches!(err, RoutingError::StreamNotFound(_)));
        assert_eq!(setup.router.calls(), vec!["find Spotify"]);
    }

    #[tokio::test]
    async fn failed_move_unloads_sink_again() {
        let setup = RouteSetup::new(RecordingRouter {
            player_running: true,
            fail_move: true,
            ..Default::default()
        });

        assert!(setup.establish(&request()).await.is_err());
        assert_eq!(setup.router.calls().last().unwrap(), "unload 536870913");
    }

    #[tokio::test]
    async fn teardown_unloads_module() {
        let setup = RouteSetup::new(RecordingRouter {
            player_running: true,
            ..Default::default()
        });
        let route = setup.establish(&request()).await.unwrap();
        setup.teardown(&route).await.unwrap();
        assert_eq!(setup.router.calls().last().unwrap(), "unload 536870913");
    }

    #[test]
    fn choose_sink_by_default_index_or_name() {
        let sinks = vec!["a".to_string(), "b".to_string()];
        assert_eq!(choose_sink(&sinks, ""), Some("a".to_string()));
        assert_eq!(choose_sink(&sinks, " 1 "), Some("b".to_string()));
        assert_eq!(choose_sink(&sinks, "b"), Some("b".to_string()));
        assert_eq!(choose_sink(&sinks, "7"), None);
        assert_eq!(choose_sink(&sinks, "c"), None);
    }
}
