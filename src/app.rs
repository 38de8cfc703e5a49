//! Application context
//!
//! One [`AppContext`] is built at startup and handed to whatever drives the
//! program (the control loop here, a tray UI elsewhere). It owns the cached
//! topology, the user's pending resolution choices and the configuration.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;

use tracing::{debug, error, info, warn};

use crate::backend::DisplayBackend;
use crate::config::{Configuration, ProfileStore};
use crate::error::{DumonError, Result};
use crate::request::{SwitchRequest, ValidatedRequest};
use crate::reset::ControlEvent;
use crate::topology::Topology;

/// Resolutions picked per output before a switch is committed.
///
/// Cleared after every successful switch, so the next menu reflects the
/// real state again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: HashMap<String, String>,
}

impl SelectionState {
    pub fn select(&mut self, output: &str, resolution: &str) {
        self.selected.insert(output.to_string(), resolution.to_string());
    }

    pub fn get(&self, output: &str) -> Option<&str> {
        self.selected.get(output).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

pub struct AppContext {
    backend: Box<dyn DisplayBackend>,
    store: ProfileStore,
    config: Configuration,
    topology: Topology,
    selection: SelectionState,
    /// Last request that was applied successfully, offered for saving
    current: Option<SwitchRequest>,
    quit_hook: Option<Box<dyn FnMut()>>,
}

impl AppContext {
    /// Loads the configuration and reads the initial topology
    pub fn new(backend: Box<dyn DisplayBackend>, store: ProfileStore) -> Result<Self> {
        let config = store.load();
        let topology = backend.read()?;
        info!(backend = backend.name(), outputs = topology.len(), "Application context ready");

        Ok(Self {
            backend,
            store,
            config,
            topology,
            selection: SelectionState::default(),
            current: None,
            quit_hook: None,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn current_request(&self) -> Option<&SwitchRequest> {
        self.current.as_ref()
    }

    /// Registers the function called when a quit is requested
    pub fn set_quit_hook(&mut self, hook: impl FnMut() + 'static) {
        self.quit_hook = Some(Box::new(hook));
    }

    /// Re-reads the outputs. The cached topology is only replaced on success.
    pub fn refresh(&mut self) -> Result<&Topology> {
        self.topology = self.backend.read()?;
        Ok(&self.topology)
    }

    /// Remembers a resolution for the next switch involving `output`
    pub fn select_resolution(&mut self, output: &str, resolution: &str) -> Result<()> {
        let device = self.topology.device(output)?;
        if !device.supports(resolution) {
            return Err(DumonError::UnknownResolution {
                output: output.to_string(),
                resolution: resolution.to_string(),
            });
        }
        self.selection.select(output, resolution);
        Ok(())
    }

    /// `Single` request for `output`, honoring a pending selection
    pub fn single_request(&self, output: &str) -> SwitchRequest {
        SwitchRequest::single(output, self.selection.get(output).map(str::to_string))
    }

    /// Horizontal sequence of `outputs`, honoring pending selections
    pub fn sequence_request(&self, outputs: &[&str], primary: Option<&str>) -> SwitchRequest {
        SwitchRequest::horizontal(
            outputs.iter().map(|o| (*o).to_string()).collect(),
            outputs
                .iter()
                .map(|o| self.selection.get(o).map(str::to_string))
                .collect(),
            primary.map(str::to_string),
        )
    }

    /// Validates, composes and executes a request.
    ///
    /// Nothing is executed when validation fails. On success the selection
    /// is cleared and the request becomes the current one.
    pub fn switch(&mut self, request: SwitchRequest) -> Result<String> {
        let validated = request.validate(&self.topology)?;
        self.run(validated)
    }

    fn run(&mut self, validated: ValidatedRequest) -> Result<String> {
        let invocation = self.backend.compose(&self.topology, &validated)?;
        info!(request = %validated.request(), command = %invocation, "Switching outputs");

        let response = self.backend.execute(&invocation)?;
        self.selection.clear();
        self.current = Some(validated.into_inner());

        if let Err(e) = self.refresh() {
            warn!(error = %e, "Failed to re-read outputs after switch");
        }
        Ok(response)
    }

    /// Back to the first output at its default resolution
    pub fn reset(&mut self) -> Result<String> {
        self.refresh()?;
        let first = self
            .topology
            .first()
            .ok_or(DumonError::NoOutputsFound)?
            .name
            .clone();
        info!(output = %first, "Resetting to single default output");
        self.switch(SwitchRequest::single(first, None))
    }

    /// Applies a saved profile; the configuration stays untouched on failure.
    ///
    /// A profile that no longer fits the outputs fails with
    /// [`DumonError::ProfileApplication`]; tool failures are passed through.
    pub fn apply_profile(&mut self, name: &str) -> Result<String> {
        let validated = ProfileStore::apply_profile(&self.config, name, &self.topology)?;
        let response = self.run(validated)?;
        debug!(profile = %name, "Profile applied");
        Ok(response)
    }

    /// Stores the current layout under `name`
    pub fn save_profile(&mut self, name: &str) -> Result<()> {
        let current = self.current.clone().ok_or_else(|| {
            DumonError::InvalidConfiguration("no layout applied yet, make a choice first".to_string())
        })?;
        self.save_profile_as(name, &current)
    }

    /// Stores `request` under `name`
    pub fn save_profile_as(&mut self, name: &str, request: &SwitchRequest) -> Result<()> {
        if name.trim().is_empty() {
            return Err(DumonError::invalid_value("name", name, "a non-empty profile name"));
        }
        self.config.insert_profile(name, request);
        self.persist();
        debug!(profile = %name, "Stored profile");
        Ok(())
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        if self.config.remove_profile(name).is_none() {
            return Err(DumonError::ProfileNotFound(name.to_string()));
        }
        self.persist();
        debug!(profile = %name, "Deleted profile");
        Ok(())
    }

    /// Write failures are logged; the in-memory configuration stays authoritative
    fn persist(&self) {
        if let Err(e) = self.store.save(&self.config) {
            error!(path = %self.store.path().display(), error = %e, "Failed to write config");
        }
    }

    fn quit(&mut self) {
        info!("Terminated...");
        if let Some(hook) = self.quit_hook.as_mut() {
            hook();
        }
    }

    /// Processes control events until a quit is requested or every sender
    /// is gone.
    pub fn run_control_loop(&mut self, events: &Receiver<ControlEvent>) {
        for event in events.iter() {
            match event {
                ControlEvent::Reset => {
                    if let Err(e) = self.reset() {
                        error!(error = %e, "Reset failed");
                    }
                }
                ControlEvent::Quit => {
                    self.quit();
                    return;
                }
            }
        }
        debug!("Control channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::mpsc;

    use crate::backend::XrandrBackend;
    use crate::runner::fake::FakeRunner;
    use crate::topology::tests::DUAL_REPORT;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        runner: Rc<FakeRunner>,
        app: AppContext,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let runner = Rc::new(FakeRunner::with_report(DUAL_REPORT));
        let backend = XrandrBackend::with_runner(Rc::clone(&runner)).unwrap();
        let store = ProfileStore::new(dir.path().join("dumon.json"));
        let app = AppContext::new(Box::new(backend), store).unwrap();
        Fixture {
            dir,
            runner,
            app,
        }
    }

    #[test]
    fn test_new_reads_topology_and_creates_config() {
        let f = fixture();
        assert_eq!(f.app.topology().len(), 2);
        assert!(f.app.config().profiles.is_empty());
        assert!(f.dir.path().join("dumon.json").exists());
    }

    #[test]
    fn test_switch_uses_selection_and_clears_it() {
        let mut f = fixture();
        f.app.select_resolution("DP-4", "1280x720").unwrap();
        let request = f.app.single_request("DP-4");
        f.app.switch(request).unwrap();

        assert_eq!(
            f.runner.configure_calls(),
            vec!["xrandr --output DP-4 --mode 1280x720 --pos 0x0 --output LVDS-0 --off"]
        );
        assert!(f.app.selection().is_empty());
        assert_eq!(
            f.app.current_request(),
            Some(&SwitchRequest::single("DP-4", Some("1280x720".into())))
        );
    }

    #[test]
    fn test_invalid_request_spawns_nothing() {
        let mut f = fixture();
        f.app.select_resolution("DP-4", "1280x720").unwrap();
        let result = f.app.switch(SwitchRequest::single("HDMI-7", None));

        assert!(matches!(result, Err(DumonError::UnknownOutput(_))));
        assert!(f.runner.configure_calls().is_empty());
        assert!(!f.app.selection().is_empty());
    }

    #[test]
    fn test_select_unsupported_resolution() {
        let mut f = fixture();
        assert!(matches!(
            f.app.select_resolution("LVDS-0", "1920x1080"),
            Err(DumonError::UnknownResolution { .. })
        ));
        assert!(f.app.selection().is_empty());
    }

    #[test]
    fn test_failed_execution_keeps_selection() {
        let mut f = fixture();
        f.runner.fail_configure(1, "xrandr: Configure crtc 0 failed");
        f.app.select_resolution("DP-4", "1280x720").unwrap();
        let request = f.app.single_request("DP-4");

        assert!(matches!(f.app.switch(request), Err(DumonError::ToolExecution { .. })));
        assert_eq!(f.app.selection().get("DP-4"), Some("1280x720"));
        assert!(f.app.current_request().is_none());
    }

    #[test]
    fn test_sequence_request_with_selection() {
        let mut f = fixture();
        f.app.select_resolution("DP-4", "1024x768").unwrap();
        let request = f.app.sequence_request(&["DP-4", "LVDS-0"], Some("LVDS-0"));
        f.app.switch(request).unwrap();

        assert_eq!(
            f.runner.configure_calls(),
            vec!["xrandr --output DP-4 --mode 1024x768 --output LVDS-0 --mode 1600x900 --primary --right-of DP-4"]
        );
    }

    #[test]
    fn test_reset_switches_to_first_output() {
        let mut f = fixture();
        f.app.reset().unwrap();
        assert_eq!(
            f.runner.configure_calls(),
            vec!["xrandr --output LVDS-0 --mode 1600x900 --pos 0x0 --output DP-4 --off"]
        );
    }

    #[test]
    fn test_profile_save_apply_delete() {
        let mut f = fixture();
        assert!(f.app.save_profile("nothing-yet").is_err());

        f.app.switch(SwitchRequest::single("DP-4", None)).unwrap();
        f.app.save_profile("external").unwrap();

        let on_disk = ProfileStore::new(f.dir.path().join("dumon.json")).load();
        assert_eq!(on_disk.profile_names().collect::<Vec<_>>(), vec!["external"]);

        f.app.apply_profile("external").unwrap();
        assert_eq!(f.runner.configure_calls().len(), 2);

        f.app.delete_profile("external").unwrap();
        assert!(matches!(
            f.app.delete_profile("external"),
            Err(DumonError::ProfileNotFound(_))
        ));
        let on_disk = ProfileStore::new(f.dir.path().join("dumon.json")).load();
        assert!(on_disk.profiles.is_empty());
    }

    #[test]
    fn test_apply_stale_profile_leaves_config_alone() {
        let mut f = fixture();
        f.app
            .save_profile_as("beamer", &SwitchRequest::single("HDMI-1", None))
            .unwrap();
        let before = f.app.config().clone();

        assert!(matches!(
            f.app.apply_profile("beamer"),
            Err(DumonError::ProfileApplication { .. })
        ));
        assert!(matches!(
            f.app.apply_profile("missing"),
            Err(DumonError::ProfileNotFound(_))
        ));
        assert_eq!(f.app.config(), &before);
        assert!(f.runner.configure_calls().is_empty());
    }

    #[test]
    fn test_control_loop_resets_then_quits() {
        let mut f = fixture();
        let quit_called = Rc::new(Cell::new(false));
        let flag = Rc::clone(&quit_called);
        f.app.set_quit_hook(move || flag.set(true));

        let (tx, rx) = mpsc::channel();
        tx.send(ControlEvent::Reset).unwrap();
        tx.send(ControlEvent::Quit).unwrap();
        tx.send(ControlEvent::Reset).unwrap();
        f.app.run_control_loop(&rx);

        assert!(quit_called.get());
        // the reset after the quit is never processed
        assert_eq!(f.runner.configure_calls().len(), 1);
    }

    #[test]
    fn test_control_loop_ends_when_senders_drop() {
        let mut f = fixture();
        let (tx, rx) = mpsc::channel::<ControlEvent>();
        drop(tx);
        f.app.run_control_loop(&rx);
        assert!(f.runner.configure_calls().is_empty());
    }
}
