use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, Array4, ArrayView1, ArrayView4, Axis, Ix4};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{Idx3d, Idx4d};

pub mod moments;

pub use moments::{Moments, TemporalMoments};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 打开 4D BOLD 文件时的错误.
#[derive(Debug, thiserror::Error)]
pub enum OpenBoldError {
    /// nifti 文件读取或解析错误.
    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 体素数据无法整理成 4D 数组.
    #[error("unexpected data shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// header 声明的维数不是 4.
    #[error("expected a 4D volume, got {0}D")]
    NotFourDimensional(usize),

    /// 时间轴太短, 无法计算时间方向的统计量.
    #[error("at least 2 volumes are required, got {0}")]
    TooFewVolumes(usize),
}

/// 从 header 中读取 (x, y, z, t) 形状.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx4d {
    let [_, x, y, z, t, ..] = h.dim;
    (x as usize, y as usize, z as usize, t as usize)
}

/// 4D nii 文件 header 的共用属性.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小, 按 (x, y, z, t) 排列.
    #[inline]
    fn shape(&self) -> Idx4d {
        get_shape_from_header(self.header())
    }

    /// 获取空间形状大小 (x, y, z).
    #[inline]
    fn spatial_shape(&self) -> Idx3d {
        let (x, y, z, _) = self.shape();
        (x, y, z)
    }

    /// 获取时间点 (volume) 个数.
    #[inline]
    fn n_volumes(&self) -> usize {
        self.shape().3
    }

    /// 获取单个 volume 的体素个数.
    #[inline]
    fn n_voxels(&self) -> usize {
        let (x, y, z) = self.spatial_shape();
        x * y * z
    }

    /// 获取单个体素分辨率, 以毫米为单位, 按 (x, y, z) 排列.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, x, y, z, ..] = self.header().pixdim;
        [x as f64, y as f64, z as f64]
    }

    /// 重复时间 (TR), 以 header 中记录的单位为准 (通常为秒).
    #[inline]
    fn repetition_time(&self) -> f64 {
        self.header().pixdim[4] as f64
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }
}

/// nii 格式 4D BOLD 扫描, 包括 header 和信号值. 信号以 `f32` 保存.
///
/// 数据按 `[x, y, z, t]` 标准 (行优先) 布局存储, 因此每个体素的时间序列在内存中连续.
#[derive(Debug, Clone)]
pub struct BoldScan {
    header: BoxedHeader,
    data: Array4<f32>,
}

impl NiftiHeaderAttr for BoldScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx4d> for BoldScan {
    type Output = f32;

    #[inline]
    fn index(&self, (x, y, z, t): Idx4d) -> &Self::Output {
        &self.data[[x, y, z, t]]
    }
}

impl BoldScan {
    /// 打开 nii (或 nii.gz) 文件格式的 4D BOLD 扫描. `path` 为文件的本地路径.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenBoldError> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        let ndim = header.dim[0] as usize;
        if ndim != 4 {
            return Err(OpenBoldError::NotFourDimensional(ndim));
        }

        // nifti 体数据按 Fortran 序排列, 转成标准布局后时间轴连续.
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .into_dimensionality::<Ix4>()?;
        let data = data.as_standard_layout().into_owned();
        debug_assert!(data.is_standard_layout());

        Self::checked(header, data)
    }

    /// 根据裸数据和体素分辨率直接创建 `BoldScan`. `data` 按 `[x, y, z, t]` 组织.
    ///
    /// # 注意
    ///
    /// 生成的 header 只填充了形状与分辨率, 你应仅将其用于合成数据或实验目的.
    pub fn fake(data: Array4<f32>, pix_dim: [f32; 3]) -> Result<Self, OpenBoldError> {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        let mut header = Box::<NiftiHeader>::default();
        let (x, y, z, t) = data.dim();
        header.dim = [4, x as u16, y as u16, z as u16, t as u16, 1, 1, 1];
        let [_, px, py, pz, pt, ..] = &mut header.pixdim;
        let [wx, wy, wz] = pix_dim;
        (*px, *py, *pz, *pt) = (wx, wy, wz, 1.0);
        header.intent_name[..4].copy_from_slice(b"fake");

        Self::checked(header, data)
    }

    fn checked(header: BoxedHeader, data: Array4<f32>) -> Result<Self, OpenBoldError> {
        let t = data.len_of(Axis(3));
        if t < 2 {
            return Err(OpenBoldError::TooFewVolumes(t));
        }
        Ok(Self { header, data })
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// 获取 `(x, y, z)` 体素的时间序列.
    ///
    /// 当索引越界时 panic.
    #[inline]
    pub fn timeseries(&self, (x, y, z): Idx3d) -> ArrayView1<'_, f32> {
        self.data.slice(ndarray::s![x, y, z, ..])
    }

    /// 逐体素计算时间方向的一阶/二阶矩.
    #[inline]
    pub fn temporal_moments(&self) -> TemporalMoments {
        TemporalMoments::of(self.data())
    }

    /// 以本扫描的 header 为参考, 将 3D 空间图 `map` 写入 `path`.
    ///
    /// 路径以 `.gz` 结尾时自动压缩. 仿射变换等空间元信息与原扫描保持一致.
    pub fn write_map<P: AsRef<Path>>(&self, path: P, map: &Array3<f32>) -> nifti::Result<()> {
        debug_assert_eq!(map.dim(), self.spatial_shape());
        WriterOptions::new(path.as_ref())
            .reference_header(&self.header)
            .write_nifti(map)
    }
}
