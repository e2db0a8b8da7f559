//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, Idx4d};

pub use crate::data::{BoldScan, NiftiHeaderAttr, OpenBoldError, TemporalMoments};

pub use crate::consts::artifacts;
pub use crate::consts::MATERIALIZED_BYTES;

pub use crate::dataset::{self, is_materialized, AnalysisStage, DatasetLayout};

pub use crate::iqm::{IqmDocument, IqmOutput, IqmSpec, IqmSummary};
pub use crate::slice_qc::SliceMeans;
pub use crate::spatial::SpatialMaps;
