//! Pause detections
//!
//! A [`PauseContext`] captures what the student was doing when the pen went
//! still. Once the pause has been placed in a problem region it becomes a
//! [`TutorDetectionResult`], held in a single-slot [`TutorDetectionState`].

use crate::region::{ProblemRegionData, RegionResolver, ResolvedRegion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Canvas tool active when the last stroke ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Pen,
    Pencil,
    Highlighter,
    Eraser,
    Lasso,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tool::Pen => "pen",
            Tool::Pencil => "pencil",
            Tool::Highlighter => "highlighter",
            Tool::Eraser => "eraser",
            Tool::Lasso => "lasso",
        };
        f.write_str(name)
    }
}

/// A canvas-space position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Snapshot of writing activity at the moment a pause was detected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseContext {
    pub duration: Duration,
    pub stroke_count: u32,
    pub last_tool: Tool,
    pub timestamp: DateTime<Utc>,
    /// Points per second
    pub last_stroke_velocity: f64,
    pub last_stroke_end_point: Option<Point>,
    pub last_stroke_page_index: Option<usize>,
}

impl PauseContext {
    pub fn new(duration: Duration, stroke_count: u32, last_tool: Tool, last_stroke_velocity: f64) -> Self {
        Self {
            duration,
            stroke_count,
            last_tool,
            timestamp: Utc::now(),
            last_stroke_velocity,
            last_stroke_end_point: None,
            last_stroke_page_index: None,
        }
    }

    pub fn with_last_stroke(mut self, end_point: Point, page_index: usize) -> Self {
        self.last_stroke_end_point = Some(end_point);
        self.last_stroke_page_index = Some(page_index);
        self
    }

    /// Place the end of the last stroke in a problem region.
    ///
    /// `None` if the pause has no stroke position or no region matches.
    pub fn resolve_region(
        &self,
        render_scale: f64,
        region_data: Option<&ProblemRegionData>,
    ) -> Option<ResolvedRegion> {
        let point = self.last_stroke_end_point?;
        let page = self.last_stroke_page_index?;
        RegionResolver::resolve_canvas_y(point.y, render_scale, page, region_data)
    }
}

/// A pause attributed to a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorDetectionResult {
    /// 0-based
    pub question_index: usize,
    /// 1-based, for display
    pub question_number: usize,
    pub subquestion_label: Option<String>,
    pub pause_context: PauseContext,
    pub timestamp: DateTime<Utc>,
}

impl TutorDetectionResult {
    pub fn from_pause(
        question_index: usize,
        pause_context: PauseContext,
        region: Option<ResolvedRegion>,
    ) -> Self {
        Self {
            question_index,
            question_number: question_index + 1,
            subquestion_label: region.and_then(|r| r.label),
            pause_context,
            timestamp: Utc::now(),
        }
    }
}

/// Holds the latest detection, nothing more
#[derive(Debug, Default)]
pub struct TutorDetectionState {
    current: Option<TutorDetectionResult>,
}

impl TutorDetectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current detection
    pub fn update(&mut self, result: TutorDetectionResult) {
        match &result.subquestion_label {
            Some(part) => tracing::info!(
                "Detected pause on Q{} part {} ({:.1}s)",
                result.question_number,
                part,
                result.pause_context.duration.as_secs_f64()
            ),
            None => tracing::info!(
                "Detected pause on Q{} ({:.1}s)",
                result.question_number,
                result.pause_context.duration.as_secs_f64()
            ),
        }
        self.current = Some(result);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&TutorDetectionResult> {
        self.current.as_ref()
    }
}
