//! Accumulated anchor and direction series.

use serde::{Deserialize, Serialize};

use crate::events::ExtractionEvent;
use crate::extract::StepSample;

/// Anchor and direction samples of every muscle over a trajectory.
///
/// Elements keep model order. Every element has exactly one anchor and one
/// direction per entry of [`time`](Self::time).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForceVectorSeries {
    time: Vec<f64>,
    elements: Vec<String>,
    anchors: Vec<Vec<[f64; 3]>>,
    directions: Vec<Vec<[f64; 3]>>,
    events: Vec<ExtractionEvent>,
}

impl ForceVectorSeries {
    /// Empty series for the given elements.
    #[must_use]
    pub fn new(elements: Vec<String>) -> Self {
        let n = elements.len();
        Self {
            time: Vec::new(),
            elements,
            anchors: vec![Vec::new(); n],
            directions: vec![Vec::new(); n],
            events: Vec::new(),
        }
    }

    /// Append one step. Elements missing from the sample are not expected;
    /// unknown ones are ignored.
    pub fn push(&mut self, sample: StepSample) {
        self.time.push(sample.time);
        for element in sample.elements {
            if let Some(i) = self.elements.iter().position(|e| *e == element.element) {
                self.anchors[i].push(element.anchor);
                self.directions[i].push(element.line_of_action.to_array());
            }
        }
        self.events.extend(sample.events);
    }

    /// Shared time axis.
    #[must_use]
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Element names in model order.
    #[must_use]
    pub fn element_names(&self) -> &[String] {
        &self.elements
    }

    /// Anchors of one element.
    #[must_use]
    pub fn anchors(&self, element: &str) -> Option<&[[f64; 3]]> {
        self.index(element).map(|i| self.anchors[i].as_slice())
    }

    /// Directions of one element, `[0, 0, 0]` at degenerate rows.
    #[must_use]
    pub fn directions(&self, element: &str) -> Option<&[[f64; 3]]> {
        self.index(element).map(|i| self.directions[i].as_slice())
    }

    /// Events collected over the run, in row order.
    #[must_use]
    pub fn events(&self) -> &[ExtractionEvent] {
        &self.events
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether no rows were extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub(crate) fn anchor_columns(&self) -> &[Vec<[f64; 3]>] {
        &self.anchors
    }

    pub(crate) fn direction_columns(&self) -> &[Vec<[f64; 3]>] {
        &self.directions
    }

    fn index(&self, element: &str) -> Option<usize> {
        self.elements.iter().position(|e| e == element)
    }
}
