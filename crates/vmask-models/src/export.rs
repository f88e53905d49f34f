//! The region export wire contract.
//!
//! Produced by the external annotation surface and consumed by
//! `import_regions`. A structured JSON document keyed by keyframe index,
//! each value an ordered list of region objects in source-frame pixel space
//! (never normalized). A compact shorthand grammar covers programmatic and
//! test use without a UI round-trip.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::region::Region;

/// One region entry in an export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExportRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ExportRegion {
    /// Materialize as a [`Region`] on the given keyframe.
    pub fn into_region(self, frame_index: u64) -> Region {
        Region {
            frame_index,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            label: self.label,
            confidence: self.confidence,
        }
    }
}

/// A full export document: keyframe index -> ordered region list.
///
/// JSON object keys are strings on the wire; non-numeric keys are surfaced
/// to the importer as rejects rather than failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionExport {
    pub keyframes: BTreeMap<String, Vec<ExportRegion>>,
}

impl RegionExport {
    /// Parse a JSON export document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Resolve string keys to keyframe indices.
    ///
    /// Returns the resolved entries plus the keys that failed to parse.
    pub fn resolved(&self) -> (BTreeMap<u64, Vec<ExportRegion>>, Vec<String>) {
        let mut resolved = BTreeMap::new();
        let mut bad_keys = Vec::new();
        for (key, regions) in &self.keyframes {
            match key.trim().parse::<u64>() {
                Ok(index) => {
                    resolved
                        .entry(index)
                        .or_insert_with(Vec::new)
                        .extend(regions.iter().cloned());
                }
                Err(_) => bad_keys.push(key.clone()),
            }
        }
        (resolved, bad_keys)
    }

    /// Add one region under a keyframe index.
    pub fn push(&mut self, frame_index: u64, region: ExportRegion) {
        self.keyframes
            .entry(frame_index.to_string())
            .or_default()
            .push(region);
    }

    /// Mark a keyframe annotated with zero targets.
    pub fn mark_empty(&mut self, frame_index: u64) {
        self.keyframes.entry(frame_index.to_string()).or_default();
    }

    /// Parse the manual/quick-annotation shorthand.
    ///
    /// Grammar: `keyframe:x,y,width,height; keyframe:x,y,width,height; ...`
    /// Whitespace around separators is tolerated, numbers may be fractional,
    /// and a trailing `@label` names the target:
    ///
    /// ```
    /// use vmask_models::RegionExport;
    /// let export = RegionExport::parse_shorthand("0:10,10,50,50@phone; 89:200,80,50,50@phone").unwrap();
    /// assert_eq!(export.keyframes.len(), 2);
    /// ```
    ///
    /// `keyframe:` with nothing after the colon marks that keyframe
    /// annotated-with-zero-targets.
    pub fn parse_shorthand(input: &str) -> Result<Self, ShorthandError> {
        let mut export = RegionExport::default();

        for raw_entry in input.split(';') {
            let entry = raw_entry.trim();
            if entry.is_empty() {
                continue;
            }

            let (frame_part, coords_part) = entry
                .split_once(':')
                .ok_or_else(|| ShorthandError::MissingColon(entry.to_string()))?;

            let frame_index: u64 = frame_part
                .trim()
                .parse()
                .map_err(|_| ShorthandError::BadKeyframe(frame_part.trim().to_string()))?;

            let coords_part = coords_part.trim();
            if coords_part.is_empty() {
                export.mark_empty(frame_index);
                continue;
            }

            let (coords_part, label) = match coords_part.split_once('@') {
                Some((coords, label)) => (coords.trim(), Some(label.trim().to_string())),
                None => (coords_part, None),
            };

            let coords: Vec<f64> = coords_part
                .split(',')
                .map(|c| {
                    c.trim()
                        .parse::<f64>()
                        .map_err(|_| ShorthandError::BadCoordinate(c.trim().to_string()))
                })
                .collect::<Result<_, _>>()?;

            if coords.len() != 4 {
                return Err(ShorthandError::WrongArity {
                    entry: entry.to_string(),
                    found: coords.len(),
                });
            }

            export.push(
                frame_index,
                ExportRegion {
                    x: coords[0],
                    y: coords[1],
                    width: coords[2],
                    height: coords[3],
                    label,
                    confidence: Some(1.0),
                },
            );
        }

        Ok(export)
    }
}

/// Errors from the shorthand grammar.
#[derive(Debug, Error, PartialEq)]
pub enum ShorthandError {
    #[error("entry '{0}' is missing the 'keyframe:' prefix")]
    MissingColon(String),

    #[error("'{0}' is not a keyframe index")]
    BadKeyframe(String),

    #[error("'{0}' is not a number")]
    BadCoordinate(String),

    #[error("entry '{entry}' has {found} coordinates, expected x,y,width,height")]
    WrongArity { entry: String, found: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_basic() {
        let export = RegionExport::parse_shorthand("0:10,20,50,60;89:200,80,50,50").unwrap();
        let (resolved, bad) = export.resolved();
        assert!(bad.is_empty());
        assert_eq!(resolved.len(), 2);
        let r = &resolved[&0][0];
        assert_eq!((r.x, r.y, r.width, r.height), (10.0, 20.0, 50.0, 60.0));
        assert_eq!(r.confidence, Some(1.0));
    }

    #[test]
    fn test_shorthand_whitespace_and_labels() {
        let export =
            RegionExport::parse_shorthand(" 10 : 1.5 , 2 , 30 , 40 @ phone ; 20: ").unwrap();
        let (resolved, _) = export.resolved();
        assert_eq!(resolved[&10][0].label.as_deref(), Some("phone"));
        assert_eq!(resolved[&10][0].x, 1.5);
        // "20:" marks an explicit zero-target keyframe.
        assert!(resolved[&20].is_empty());
    }

    #[test]
    fn test_shorthand_errors() {
        assert_eq!(
            RegionExport::parse_shorthand("10,20,30,40"),
            Err(ShorthandError::MissingColon("10,20,30,40".to_string()))
        );
        assert!(matches!(
            RegionExport::parse_shorthand("5:1,2,3"),
            Err(ShorthandError::WrongArity { found: 3, .. })
        ));
        assert_eq!(
            RegionExport::parse_shorthand("x:1,2,3,4"),
            Err(ShorthandError::BadKeyframe("x".to_string()))
        );
    }

    #[test]
    fn test_json_roundtrip_and_bad_keys() {
        let json = r#"{"0": [{"x": 1, "y": 2, "width": 3, "height": 4, "label": "phone"}],
                       "not-a-frame": []}"#;
        let export = RegionExport::from_json(json).unwrap();
        let (resolved, bad) = export.resolved();
        assert_eq!(resolved.len(), 1);
        assert_eq!(bad, vec!["not-a-frame".to_string()]);

        let back = serde_json::to_string(&export).unwrap();
        assert_eq!(RegionExport::from_json(&back).unwrap(), export);
    }

    #[test]
    fn test_into_region() {
        let entry = ExportRegion {
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
            label: None,
            confidence: None,
        };
        let region = entry.into_region(7);
        assert_eq!(region.frame_index, 7);
        assert!(region.is_valid());
    }
}
