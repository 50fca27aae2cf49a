//! Musculoskeletal model descriptor parser.
//!
//! Reads `.osim` model documents (`OpenSimDocument/Model`) and derives what
//! the trajectory pipeline needs from them:
//!
//! - the canonical, category-grouped list of state names ([`enumerate_states`])
//! - the terminal-segment line of action of every muscle ([`enumerate_force_geometry`])
//! - a structural sanity report ([`validate`])
//!
//! # Example
//!
//! ```
//! use msk_osim::{enumerate_states, parse_osim_str};
//!
//! let xml = r#"
//!     <OpenSimDocument Version="40000">
//!       <Model name="knee">
//!         <JointSet><objects>
//!           <PinJoint name="knee">
//!             <socket_parent_frame>/ground</socket_parent_frame>
//!             <socket_child_frame>/bodyset/tibia</socket_child_frame>
//!             <coordinates><Coordinate name="knee_flexion"/></coordinates>
//!           </PinJoint>
//!         </objects></JointSet>
//!       </Model>
//!     </OpenSimDocument>
//! "#;
//!
//! let model = parse_osim_str(xml).unwrap();
//! let states = enumerate_states(&model);
//! assert_eq!(states.names()[0], "/jointset/knee/knee_flexion/value");
//! assert_eq!(states.len(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod catalogue;
mod error;
mod geometry;
mod parser;
mod types;
mod validation;

pub use catalogue::{
    CoordinateState, StateNameCatalogue, coordinate_state_path, enumerate_states,
    enumerate_states_with, force_state_path,
};
pub use error::{OsimError, Result};
pub use geometry::{
    DEGENERATE_LENGTH, ForceGeometry, LineOfAction, enumerate_force_geometry,
    enumerate_force_geometry_with,
};
pub use parser::{load_osim_file, parse_osim_str};
pub use types::{
    AxisFunction, BodyDescriptor, CoordinateDescriptor, DEFAULT_MUSCLE_TAG, ForceElement,
    GROUND_FRAME, JointDescriptor, JointKind, ModelDescriptor, MotionType, OffsetFrame,
    PathPointDescriptor, TransformAxis,
};
pub use validation::{ValidationIssue, ValidationReport, frame_exists, validate};
