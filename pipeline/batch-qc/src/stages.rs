//! 三个分析阶段的计算, 作为本程序的子命令运行.
//!
//! 每个阶段把输出写入 `{results_root}/{subject}/{stage}/`, 完成标记总是最后写出.
//! 标记先写到同目录下的临时文件, 再重命名为最终文件名, 因此中途崩溃不会留下标记.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bold_berry::consts::artifacts;
use bold_berry::dataset::{is_materialized, AnalysisStage};
use bold_berry::iqm::{IqmDocument, IqmOutput};
use bold_berry::slice_qc::SliceMeans;
use bold_berry::spatial::SpatialMaps;
use bold_berry::{BoldScan, NiftiHeaderAttr};

use crate::config::QcConfig;
use crate::error::StageComputeError;

type Result<T> = std::result::Result<T, StageComputeError>;

/// 运行 `stage`, 返回完成标记路径.
pub fn run_stage(stage: AnalysisStage, cfg: &QcConfig, subject: &str) -> Result<PathBuf> {
    match stage {
        AnalysisStage::SpatialQc => spatial_qc(cfg, subject),
        AnalysisStage::SliceQc => slice_qc(cfg, subject),
        AnalysisStage::Iqm => iqm(cfg, subject),
    }
}

/// 读取被试的原始数据. 文件不存在或只是占位文件时报错.
fn load(cfg: &QcConfig, subject: &str) -> Result<BoldScan> {
    let path = cfg.layout().bold_path(subject);
    if !is_materialized(&path, cfg.materialized_bytes) {
        return Err(StageComputeError::NotMaterialized(path));
    }
    log::info!("loading {}", path.display());
    let scan = BoldScan::open(&path).map_err(|source| StageComputeError::Open {
        path: path.clone(),
        source,
    })?;
    log::info!(
        "shape {:?}, voxel size {:?}, TR {}",
        scan.shape(),
        scan.pix_dim(),
        scan.repetition_time()
    );
    Ok(scan)
}

/// 创建阶段输出目录.
fn out_dir(cfg: &QcConfig, subject: &str, stage: AnalysisStage) -> Result<PathBuf> {
    let dir = cfg.layout().stage_dir(subject, stage);
    fs::create_dir_all(&dir).map_err(|source| StageComputeError::Io {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

/// 完成标记的临时文件路径. 保留原文件名后缀, 以便 nifti 按后缀决定是否压缩.
fn partial(marker: &Path) -> PathBuf {
    let name = marker
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    marker.with_file_name(format!(".partial-{name}"))
}

/// 将临时文件重命名为完成标记.
fn publish(tmp: &Path, marker: &Path) -> Result<()> {
    fs::rename(tmp, marker).map_err(|source| StageComputeError::Io {
        path: marker.to_owned(),
        source,
    })
}

fn write_map(scan: &BoldScan, path: &Path, map: &ndarray::Array3<f32>) -> Result<()> {
    scan.write_map(path, map)
        .map_err(|source| StageComputeError::Nifti {
            path: path.to_owned(),
            source,
        })
}

/// 空间 QC: 时间标准差图和时间均值图 (完成标记).
pub fn spatial_qc(cfg: &QcConfig, subject: &str) -> Result<PathBuf> {
    let scan = load(cfg, subject)?;
    let dir = out_dir(cfg, subject, AnalysisStage::SpatialQc)?;

    let maps = SpatialMaps::of(&scan.temporal_moments());
    if let Some((lo, hi)) = maps.mean_range() {
        log::info!("mean signal range [{lo:.2}, {hi:.2}]");
    }

    write_map(&scan, &dir.join(artifacts::STD_BOLD), &maps.std)?;

    let marker = dir.join(artifacts::MEAN_BOLD);
    let tmp = partial(&marker);
    write_map(&scan, &tmp, &maps.mean)?;
    publish(&tmp, &marker)?;
    log::info!("saved {}", marker.display());
    Ok(marker)
}

/// 层面 QC: 每帧每层平均信号 (完成标记).
pub fn slice_qc(cfg: &QcConfig, subject: &str) -> Result<PathBuf> {
    let scan = load(cfg, subject)?;
    let dir = out_dir(cfg, subject, AnalysisStage::SliceQc)?;

    let sm = SliceMeans::of(scan.data());
    let (nt, nz) = sm.shape();
    log::info!("slicemean: {nt} volumes x {nz} slices");
    for p in sm.profile() {
        log::debug!("slice {:3}: mean {:.3}, std {:.3}", p.z, p.mean, p.std);
    }

    let marker = dir.join(artifacts::SLICEMEAN);
    let tmp = partial(&marker);
    sm.write_npy(&tmp).map_err(|source| StageComputeError::Npy {
        path: tmp.clone(),
        source,
    })?;
    publish(&tmp, &marker)?;
    log::info!("saved {}", marker.display());
    Ok(marker)
}

/// IQM: tSNR 图, CoV 图, DVARS 序列和标量汇总 (完成标记).
pub fn iqm(cfg: &QcConfig, subject: &str) -> Result<PathBuf> {
    let scan = load(cfg, subject)?;
    let dir = out_dir(cfg, subject, AnalysisStage::Iqm)?;

    let out = IqmOutput::compute(&scan, &cfg.iqm);
    let summary = out.summary();
    log::info!(
        "mask: {} / {} voxels",
        summary.n_voxels_mask,
        scan.n_voxels()
    );
    log::info!(
        "tSNR {:?}, CoV {:?}%, DVARS {:?} ({} spikes), GCOR {:?}",
        summary.tsnr_median,
        summary.cov_median,
        summary.dvars_median,
        summary.dvars_n_spikes,
        summary.gcor
    );

    write_map(&scan, &dir.join(artifacts::TSNR_MAP), &out.tsnr_map)?;
    write_map(&scan, &dir.join(artifacts::COV_MAP), &out.cov_map)?;

    let tsv = dir.join(artifacts::DVARS_TSV);
    let io_err = |path: &Path| {
        let path = path.to_owned();
        move |source: std::io::Error| StageComputeError::Io { path, source }
    };
    let mut w = BufWriter::new(File::create(&tsv).map_err(io_err(&tsv))?);
    out.dvars.write_tsv(&mut w).map_err(io_err(&tsv))?;
    w.flush().map_err(io_err(&tsv))?;

    let doc = IqmDocument::new(subject, &cfg.session, &summary);
    let marker = dir.join(artifacts::IQM_JSON);
    let text = serde_json::to_string_pretty(&doc).map_err(|source| StageComputeError::Encode {
        path: marker.clone(),
        source,
    })?;
    let tmp = partial(&marker);
    fs::write(&tmp, text).map_err(io_err(&tmp))?;
    publish(&tmp, &marker)?;
    log::info!("saved {}", marker.display());
    Ok(marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use nifti::writer::WriterOptions;

    /// 写一个 4x4x3x6 的合成扫描, 外圈体素为背景.
    fn fixture(root: &Path) -> QcConfig {
        let mut cfg = crate::testing::config(root);
        cfg.materialized_bytes = 0;
        let path = cfg.layout().bold_path("sub-01");
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let data = Array4::from_shape_fn((4, 4, 3, 6), |(x, y, z, t)| {
            let inside = (1..3).contains(&x) && (1..3).contains(&y);
            if inside {
                500.0 + (z * 10) as f32 + ((t * 7 + x + y) % 5) as f32
            } else {
                0.0
            }
        });
        WriterOptions::new(&path).write_nifti(&data).unwrap();
        cfg
    }

    fn no_partials(dir: &Path) -> bool {
        fs::read_dir(dir)
            .unwrap()
            .all(|e| !e.unwrap().file_name().to_string_lossy().starts_with(".partial-"))
    }

    #[test]
    fn test_missing_volume_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = crate::testing::config(dir.path());
        let err = spatial_qc(&cfg, "sub-01").unwrap_err();
        assert!(matches!(err, StageComputeError::NotMaterialized(_)));
        assert!(!cfg.layout().marker_path("sub-01", AnalysisStage::SpatialQc).exists());
    }

    #[test]
    fn test_spatial_qc_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = fixture(dir.path());
        let marker = run_stage(AnalysisStage::SpatialQc, &cfg, "sub-01").unwrap();
        assert_eq!(marker, cfg.layout().marker_path("sub-01", AnalysisStage::SpatialQc));
        assert!(marker.is_file());
        let out = marker.parent().unwrap();
        assert!(out.join(artifacts::STD_BOLD).is_file());
        assert!(no_partials(out));
    }

    #[test]
    fn test_slice_qc_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = fixture(dir.path());
        let marker = run_stage(AnalysisStage::SliceQc, &cfg, "sub-01").unwrap();
        let back: ndarray::Array2<f32> = ndarray_npy::read_npy(&marker).unwrap();
        assert_eq!(back.dim(), (6, 3));
        assert!(no_partials(marker.parent().unwrap()));
    }

    #[test]
    fn test_iqm_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = fixture(dir.path());
        let marker = run_stage(AnalysisStage::Iqm, &cfg, "sub-01").unwrap();
        let out = marker.parent().unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&marker).unwrap()).unwrap();
        assert_eq!(v["subject"], "sub-01");
        assert_eq!(v["session"], "ses-06");
        assert_eq!(v["n_voxels_mask"], 12);
        assert_eq!(v["dvars_spike_threshold_factor"], 1.5);
        assert!(v["tsnr_median"].as_f64().unwrap() > 0.0);
        assert!(v["gcor"].is_number());

        let tsv = fs::read_to_string(out.join(artifacts::DVARS_TSV)).unwrap();
        let lines: Vec<_> = tsv.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "dvars");
        assert_eq!(lines[1], "nan");
        assert!(out.join(artifacts::TSNR_MAP).is_file());
        assert!(out.join(artifacts::COV_MAP).is_file());
        assert!(no_partials(out));
    }
}
