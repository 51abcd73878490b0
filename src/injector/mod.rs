//! Writes a canonical signal into a host application's configuration surface.
//!
//! One injection at a time per injector. Every injection first shows the
//! confirmation panel, then tries to find (or open) the host surface and
//! writes the fields one by one. Missing fields are skipped, a missing
//! surface leaves only the panel.

pub mod dom;
pub mod locator;
pub mod page;
pub mod panel;

pub use dom::{DomEvent, Element, HostDocument, NodeId, Selector, VirtualDocument};
pub use locator::{default_surface_locators, locate_first, Locator};
pub use page::PageAgent;
pub use panel::{
    copy_with_fallback, Clipboard, ClipboardError, ConfirmationPanel, CopyChannel, MemoryClipboard,
    PANEL_ID,
};

use crate::models::signal::CanonicalSignal;
use crate::signals::coerce::now_iso;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InjectError {
    #[error("Injection already in progress")]
    AlreadyInProgress,
}

#[derive(Debug, Clone)]
pub struct InjectorConfig {
    /// Prefix of every host input label, e.g. `LIVE: Pair`
    pub label_prefix: String,
    /// Name shown in the host legend for the target indicator
    pub indicator_name: String,
    /// Pause after each field write
    pub settle_delay: Duration,
    /// Pause between opening a select and reading its options
    pub select_open_delay: Duration,
    /// Press OK/Apply (or close) on the surface once all fields are written
    pub confirm_after_write: bool,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            label_prefix: "LIVE: ".to_string(),
            indicator_name: "SignalBridge".to_string(),
            settle_delay: Duration::from_millis(100),
            select_open_delay: Duration::from_millis(200),
            confirm_after_write: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Checkbox(bool),
    Select(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub label: String,
    pub value: FieldValue,
}

impl FieldWrite {
    fn new(prefix: &str, name: &str, value: FieldValue) -> Self {
        Self {
            label: format!("{}{}", prefix, name),
            value,
        }
    }
}

/// The fields written for one signal, in write order
pub fn field_plan(signal: &CanonicalSignal, label_prefix: &str) -> Vec<FieldWrite> {
    let number = |v: f64| FieldValue::Text(v.to_string());
    let timestamp = if signal.timestamp.is_empty() {
        now_iso()
    } else {
        signal.timestamp.clone()
    };
    let p = label_prefix;
    vec![
        FieldWrite::new(p, "Active", FieldValue::Checkbox(true)),
        FieldWrite::new(p, "Pair", FieldValue::Text(signal.pair.clone())),
        FieldWrite::new(p, "Direction", FieldValue::Select(signal.direction.to_string())),
        FieldWrite::new(p, "Entry Min", number(signal.entry_min)),
        FieldWrite::new(p, "Entry Max", number(signal.entry_max)),
        FieldWrite::new(p, "Stop Loss", number(signal.stop_loss)),
        FieldWrite::new(p, "TP1", number(signal.tp1)),
        FieldWrite::new(p, "TP2", number(signal.tp2)),
        FieldWrite::new(p, "Full TP", number(signal.tp_full)),
        FieldWrite::new(p, "Confidence", number(signal.confidence)),
        FieldWrite::new(p, "Setup", FieldValue::Text(signal.setup.clone())),
        FieldWrite::new(p, "Timestamp", FieldValue::Text(timestamp)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    Written,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct InjectionReport {
    pub surface_found: bool,
    /// Which locator strategy found the surface
    pub locator: Option<&'static str>,
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    pub panel: ConfirmationPanel,
}

/// Held for the duration of one `inject` call
struct InjectionSession<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InjectionSession<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, InjectError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| InjectError::AlreadyInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for InjectionSession<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct FieldInjector<D: HostDocument> {
    document: Arc<D>,
    config: InjectorConfig,
    locators: Vec<Locator>,
    in_progress: AtomicBool,
}

impl<D: HostDocument> FieldInjector<D> {
    pub fn new(document: Arc<D>, config: InjectorConfig) -> Self {
        let locators = default_surface_locators(&config.label_prefix);
        Self {
            document,
            config,
            locators,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn with_locators(mut self, locators: Vec<Locator>) -> Self {
        self.locators = locators;
        self
    }

    pub fn is_injecting(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Remove the confirmation panel from the host document
    pub fn dismiss_panel(&self) -> bool {
        self.document.remove_overlay(PANEL_ID)
    }

    /// Inject `signal` into the host surface. A concurrent call fails immediately.
    pub async fn inject(&self, signal: &CanonicalSignal) -> Result<InjectionReport, InjectError> {
        let _session = InjectionSession::acquire(&self.in_progress)?;
        info!(
            pair = %signal.pair,
            direction = %signal.direction,
            "FieldInjector: starting injection"
        );

        let panel = ConfirmationPanel::new(signal.clone());
        self.document.mount_overlay(PANEL_ID, &panel.render());

        let surface = match self.locate_surface() {
            Some(found) => Some(found),
            None if self.open_surface() => {
                tokio::time::sleep(self.config.settle_delay).await;
                self.locate_surface()
            }
            None => None,
        };

        let Some((surface, locator)) = surface else {
            warn!(
                pair = %signal.pair,
                "FieldInjector: configuration surface not found, panel only"
            );
            return Ok(InjectionReport {
                surface_found: false,
                locator: None,
                written: Vec::new(),
                skipped: Vec::new(),
                panel,
            });
        };
        debug!(strategy = locator, "FieldInjector: surface located");

        let mut written = Vec::new();
        let mut skipped = Vec::new();
        for field in field_plan(signal, &self.config.label_prefix) {
            match self.write_field(surface, &field).await {
                FieldOutcome::Written => written.push(field.label),
                FieldOutcome::NotFound => {
                    warn!(label = %field.label, "FieldInjector: input not found, skipping");
                    skipped.push(field.label);
                }
            }
            tokio::time::sleep(self.config.settle_delay).await;
        }

        if self.config.confirm_after_write {
            self.confirm_surface();
        }

        info!(
            written = written.len(),
            skipped = skipped.len(),
            "FieldInjector: injection finished"
        );
        Ok(InjectionReport {
            surface_found: true,
            locator: Some(locator),
            written,
            skipped,
            panel,
        })
    }

    fn locate_surface(&self) -> Option<(NodeId, &'static str)> {
        locate_first(&self.locators, self.document.as_ref()).map(|(node, l)| (node, l.kind()))
    }

    /// Open the indicator's settings from the legend or the object tree
    fn open_surface(&self) -> bool {
        let doc = self.document.as_ref();
        let root = doc.root();
        let name = self.config.indicator_name.as_str();

        for item in doc.query_all(root, &Selector::attr("data-name", "legend-source-item")) {
            let title = doc.query_first_of(
                item,
                &[
                    Selector::class_contains("sourceTitleBody"),
                    Selector::class_contains("title"),
                ],
            );
            let Some(title) = title else { continue };
            if !doc.text_content(title).contains(name) {
                continue;
            }

            let settings = doc.query_first_of(
                item,
                &[
                    Selector::attr("data-name", "legend-settings-action"),
                    Selector::attr_contains("aria-label", "Settings"),
                    Selector::class_contains("settings"),
                ],
            );
            match settings {
                Some(button) => doc.click(button),
                None => doc.dispatch(item, DomEvent::DoubleClick),
            }
            debug!(indicator = name, "FieldInjector: opened settings from legend");
            return true;
        }

        for row in doc.query_all(root, &Selector::class_contains("itemRow")) {
            if doc.text_content(row).contains(name) {
                doc.dispatch(row, DomEvent::DoubleClick);
                debug!(indicator = name, "FieldInjector: opened settings from object tree");
                return true;
            }
        }

        false
    }

    fn find_row(&self, surface: NodeId, label: &str) -> Option<NodeId> {
        let doc = self.document.as_ref();
        let rows = [
            Selector::class_contains("cell"),
            Selector::class_contains("row"),
            Selector::tag("div"),
        ]
        .iter()
        .map(|s| doc.query_all(surface, s))
        .find(|rows| !rows.is_empty())
        .unwrap_or_default();

        rows.into_iter().find(|row| {
            let label_el = doc
                .query_first_of(
                    *row,
                    &[Selector::class_contains("label"), Selector::tag("span")],
                )
                .unwrap_or(*row);
            doc.text_content(label_el).contains(label)
        })
    }

    async fn write_field(&self, surface: NodeId, field: &FieldWrite) -> FieldOutcome {
        let doc = self.document.as_ref();
        let Some(row) = self.find_row(surface, &field.label) else {
            return FieldOutcome::NotFound;
        };

        match &field.value {
            FieldValue::Checkbox(desired) => {
                let toggle = doc.query_first_of(
                    row,
                    &[
                        Selector::input_type("checkbox"),
                        Selector::class_contains("switcher"),
                        Selector::attr("role", "checkbox"),
                    ],
                );
                let Some(toggle) = toggle else {
                    return FieldOutcome::NotFound;
                };
                if doc.is_checked(toggle) != *desired {
                    doc.click(toggle);
                }
                FieldOutcome::Written
            }
            FieldValue::Select(wanted) => {
                let control = doc.query_first_of(
                    row,
                    &[
                        Selector::tag("select"),
                        Selector::class_contains("dropdown"),
                        Selector::attr("role", "listbox"),
                    ],
                );
                let Some(control) = control else {
                    return FieldOutcome::NotFound;
                };
                doc.click(control);
                tokio::time::sleep(self.config.select_open_delay).await;

                match self.find_option(wanted) {
                    Some(option) => {
                        doc.click(option);
                        FieldOutcome::Written
                    }
                    None => {
                        debug!(
                            label = %field.label,
                            value = %wanted,
                            "FieldInjector: no matching option"
                        );
                        FieldOutcome::NotFound
                    }
                }
            }
            FieldValue::Text(value) => {
                let input = doc.query_first_of(
                    row,
                    &[
                        Selector::input_type("text"),
                        Selector::input_type("number"),
                        Selector::tag("input"),
                        Selector::attr("contenteditable", "true"),
                    ],
                );
                let Some(input) = input else {
                    return FieldOutcome::NotFound;
                };
                doc.focus(input);
                doc.set_native_value(input, value);
                doc.dispatch(input, DomEvent::Input);
                doc.dispatch(input, DomEvent::Change);
                doc.dispatch(input, DomEvent::KeyUp);
                FieldOutcome::Written
            }
        }
    }

    /// Option list is searched document-wide: exact text first, then substring
    fn find_option(&self, wanted: &str) -> Option<NodeId> {
        let doc = self.document.as_ref();
        let root = doc.root();
        let options = [Selector::class_contains("menuItem"), Selector::attr("role", "option")]
            .iter()
            .map(|s| doc.query_all(root, s))
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let texts: Vec<(NodeId, String)> = options
            .into_iter()
            .map(|node| (node, doc.text_content(node)))
            .collect();
        texts
            .iter()
            .find(|(_, text)| text.trim() == wanted)
            .or_else(|| texts.iter().find(|(_, text)| text.contains(wanted)))
            .map(|(node, _)| *node)
    }

    /// Press OK/Apply, or close the surface if there is no such button
    fn confirm_surface(&self) -> bool {
        let doc = self.document.as_ref();
        let root = doc.root();

        for button in doc.query_all(root, &Selector::tag("button")) {
            let text = doc.text_content(button).trim().to_lowercase();
            if text == "ok" || text == "apply" {
                doc.click(button);
                return true;
            }
        }

        let close = doc.query_first_of(
            root,
            &[
                Selector::attr("data-name", "close"),
                Selector::attr("aria-label", "Close"),
                Selector::class_contains("close"),
            ],
        );
        match close {
            Some(button) => {
                doc.click(button);
                true
            }
            None => false,
        }
    }
}
