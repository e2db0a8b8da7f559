#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供 4D BOLD fMRI 扫描的读写, 数据集路径组织和质量控制 (QC) 算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 按照 BIDS 风格组织的数据集 (`sub-*/ses-*/func/*_bold.nii.gz`)
//!   进行适配, 其它组织方式需要自行构造 [`dataset::DatasetLayout`].
//! 2. 在非期望情况下 (例如索引越界), 程序会直接 panic, 而不会导致内存错误.
//!
//! # 功能
//!
//! ### 4D BOLD 读写 ✅
//!
//! `BoldScan` 按 `[x, y, z, t]` 标准布局存储信号, 每个体素的时间序列在内存中连续.
//! 输出的 3D 图沿用原扫描的 header, 因此空间元信息保持一致.
//!
//! 实现位于 `bold-berry/src/data`.
//!
//! ### 空间 QC ✅
//!
//! 时间均值图和时间标准差图.
//!
//! 实现位于 `bold-berry/src/spatial.rs`.
//!
//! ### 层面 QC ✅
//!
//! 每帧每层的平均信号矩阵, 及每层的时间统计.
//!
//! 实现位于 `bold-berry/src/slice_qc.rs`.
//!
//! ### 图像质量指标 ✅
//!
//! 1. 基于强度百分位数的脑掩膜; ✅
//! 2. tSNR / CoV 逐体素图及掩膜内中位数; ✅
//! 3. DVARS 序列与尖峰计数; ✅
//! 4. GCOR 全局相关 (线性复杂度实现). ✅
//!
//! 实现位于 `bold-berry/src/iqm`.
//!
//! ### 数据集组织 ✅
//!
//! 原始数据路径, 参考扫描路径, 各分析阶段的输出目录与完成标记, 被试发现.
//!
//! 实现位于 `bold-berry/src/dataset`.

/// 三维索引 `(x, y, z)`.
pub type Idx3d = (usize, usize, usize);

/// 四维索引 `(x, y, z, t)`.
pub type Idx4d = (usize, usize, usize, usize);

/// 4D BOLD nii 文件基础数据结构.
mod data;

pub use data::{BoldScan, Moments, NiftiHeaderAttr, OpenBoldError, TemporalMoments};

pub mod consts;

pub mod dataset;
pub mod iqm;
pub mod prelude;
pub mod slice_qc;
pub mod spatial;
pub mod stats;
