//! ONNX Runtime backend shared by the detection graph and the loss graph.

use anyhow::{bail, Result};
use half::{bf16, f16};
use ndarray::{Array, IxDyn};
use prost::Message;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use ort::{
    execution_providers::{ExecutionProvider,
                          CPUExecutionProvider,
                          CUDAExecutionProvider,
                          TensorRTExecutionProvider,
                          CoreMLExecutionProvider},
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::{Session, SessionInputValue},
    tensor::TensorElementType,
    value::{DynValue, Value},
};
use crate::common::InferenceDevice;
use crate::data::{ConfigOrt, MinOptMax, TimeCalc, Xs, X, CROSS_MARK};
use crate::detection_runners::ort_detector::onnx;
use crate::error::DetectorError;
use crate::utils::{human_bytes, make_divisible};

/// ONNX Runtime tensor attributes: names, data types and dimensions (`0` for dynamic axes).
#[derive(Debug, Clone, Default)]
pub struct OrtTensorAttr {
    pub names: Vec<String>,
    pub dtypes: Vec<TensorElementType>,
    pub dimss: Vec<Vec<usize>>,
}

/// ONNXRuntime Backend
#[derive(Debug)]
pub struct OrtEngine {
    name: String,
    session: Session,
    device: InferenceDevice,
    inputs_attrs: OrtTensorAttr,
    outputs_attrs: OrtTensorAttr,
    profile: bool,
    model_proto: onnx::ModelProto,
    infer_time: TimeCalc,
}

impl OrtEngine {
    pub fn new(config: &ConfigOrt) -> Result<Self> {
        // onnx graph
        let model_proto = Self::load_onnx(&config.onnx_path)?;

        let graph = match &model_proto.graph {
            Some(graph) => graph,
            None => bail!("No graph found in this proto. Failed to parse ONNX model."),
        };
        // model params & mems
        let byte_alignment = 16;
        let mut params: usize = 0;
        let mut wbmems: usize = 0;
        let mut initializer_names: HashSet<&str> = HashSet::new();
        for tensor_proto in graph.initializer.iter() {
            initializer_names.insert(&tensor_proto.name);
            let param = tensor_proto.dims.iter().product::<i64>().max(0) as usize;
            params += param;

            let param = make_divisible(param, byte_alignment);
            let n = Self::nbytes_from_onnx_dtype_id(tensor_proto.data_type as usize);
            wbmems += param * n;
        }

        // inputs & outputs
        let inputs_attrs = Self::io_from_onnx_value_info(&initializer_names, &graph.input)?;
        let outputs_attrs = Self::io_from_onnx_value_info(&initializer_names, &graph.output)?;
        log::debug!("Inputs: {:?} | Outputs: {:?}", inputs_attrs, outputs_attrs);
        let inputs_minoptmax = Self::build_inputs_minoptmax(&inputs_attrs, config)?;

        // environment
        let ort_init = match &config.ort_lib_path {
            Some(lib_path) => ort::init_from(lib_path.to_string_lossy().to_string()),
            None => ort::init(),
        };
        if let Err(e) = ort_init.commit() {
            bail!("{CROSS_MARK} Failed to commit ORT environment: {:?}", e);
        }

        let mut builder = Session::builder()?;

        let device = match config.device {
            InferenceDevice::TensorRT(device_id) => {
                match Self::build_trt(
                    &inputs_attrs.names,
                    &inputs_minoptmax,
                    &mut builder,
                    device_id,
                    config.trt_fp16_enable,
                    config.trt_engine_cache_enable,
                ) {
                    Ok(()) => config.device,
                    Err(err) => Self::fallback_cpu(&mut builder, err)?,
                }
            }
            InferenceDevice::CUDA(device_id) => match Self::build_cuda(&mut builder, device_id) {
                Ok(()) => config.device,
                Err(err) => Self::fallback_cpu(&mut builder, err)?,
            },
            InferenceDevice::CoreML(_) => match Self::build_coreml(&mut builder) {
                Ok(()) => config.device,
                Err(err) => Self::fallback_cpu(&mut builder, err)?,
            },
            InferenceDevice::Auto => Self::build_auto(&mut builder)?,
            InferenceDevice::CPU => {
                Self::build_cpu(&mut builder)?;
                InferenceDevice::CPU
            }
        };

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&config.onnx_path)?;

        let name = config
            .onnx_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // summary
        log::info!(
            "Backend: ONNXRuntime | Graph: {} | Producer: {} | Opset: {} | Device: {} | Params: {} | Weights: {}B",
            name,
            model_proto.producer_name,
            model_proto.opset_import.first().map(|o| o.version).unwrap_or_default(),
            device,
            human_bytes(params as f64),
            human_bytes(wbmems as f64),
        );

        Ok(Self {
            name,
            session,
            device,
            inputs_attrs,
            outputs_attrs,
            profile: config.profile,
            model_proto,
            infer_time: TimeCalc::default(),
        })
    }

    fn fallback_cpu(builder: &mut SessionBuilder, err: anyhow::Error) -> Result<InferenceDevice> {
        log::warn!("{err}, Using cpu");
        Self::build_cpu(builder)?;
        Ok(InferenceDevice::CPU)
    }

    fn build_auto(builder: &mut SessionBuilder) -> Result<InferenceDevice> {
        if Self::build_cuda(builder, 0).is_ok() {
            return Ok(InferenceDevice::CUDA(0));
        }
        if cfg!(target_os = "macos") && Self::build_coreml(builder).is_ok() {
            return Ok(InferenceDevice::CoreML(0));
        }
        log::info!("No accelerator available, using cpu");
        Self::build_cpu(builder)?;
        Ok(InferenceDevice::CPU)
    }

    fn build_trt(
        names: &[String],
        inputs_minoptmax: &[Vec<MinOptMax>],
        builder: &mut SessionBuilder,
        device_id: usize,
        fp16_enable: bool,
        engine_cache_enable: bool,
    ) -> Result<()> {
        // auto generate shapes
        let mut spec_min = String::new();
        let mut spec_opt = String::new();
        let mut spec_max = String::new();
        for (i, name) in names.iter().enumerate() {
            if i != 0 {
                spec_min.push(',');
                spec_opt.push(',');
                spec_max.push(',');
            }
            let dims = &inputs_minoptmax[i];
            let join = |f: fn(&MinOptMax) -> usize| {
                dims.iter().map(|d| f(d).to_string()).collect::<Vec<_>>().join("x")
            };
            spec_min += &format!("{}:{}", name, join(MinOptMax::min));
            spec_opt += &format!("{}:{}", name, join(MinOptMax::opt));
            spec_max += &format!("{}:{}", name, join(MinOptMax::max));
        }
        let trt = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(fp16_enable)
            .with_engine_cache(engine_cache_enable)
            .with_timing_cache(false)
            .with_profile_min_shapes(spec_min)
            .with_profile_opt_shapes(spec_opt)
            .with_profile_max_shapes(spec_max);
        if trt.is_available()? {
            if let Err(err) = trt.register(builder) {
                bail!("{CROSS_MARK} TensorRT initialization failed: {:?}", err)
            }
            log::info!("Initial model serialization with TensorRT may take some time...");
            Ok(())
        } else {
            bail!("{CROSS_MARK} TensorRT execution provider not available")
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let ep = CUDAExecutionProvider::default().with_device_id(device_id as i32);
        if ep.is_available()? {
            if let Err(err) = ep.register(builder) {
                bail!("{CROSS_MARK} CUDA initialization failed: {:?}", err)
            }
            Ok(())
        } else {
            bail!("{CROSS_MARK} CUDA execution provider not available")
        }
    }

    fn build_coreml(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CoreMLExecutionProvider::default().with_subgraphs(false);
        if ep.is_available()? {
            if let Err(err) = ep.register(builder) {
                bail!("{CROSS_MARK} CoreML initialization failed: {:?}", err)
            }
            Ok(())
        } else {
            bail!("{CROSS_MARK} CoreML execution provider not available")
        }
    }

    fn build_cpu(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CPUExecutionProvider::default();
        if ep.is_available()? {
            if let Err(err) = ep.register(builder) {
                return Err(DetectorError::DeviceUnavailable(format!("{CROSS_MARK} CPU initialization failed: {:?}", err)).into());
            }
            Ok(())
        } else {
            Err(DetectorError::DeviceUnavailable(format!("{CROSS_MARK} CPU execution provider not available")).into())
        }
    }

    fn tensor_preprocess(x: &X, dtype: &TensorElementType) -> Result<DynValue> {
        let x = match dtype {
            TensorElementType::Float32 => Value::from_array(x.0.clone())?.into_dyn(),
            TensorElementType::Float64 => Value::from_array(x.mapv(|x_| x_ as f64))?.into_dyn(),
            TensorElementType::Float16 => Value::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            TensorElementType::Bfloat16 => Value::from_array(x.mapv(bf16::from_f32))?.into_dyn(),
            TensorElementType::Int32 => Value::from_array(x.mapv(|x_| x_ as i32))?.into_dyn(),
            TensorElementType::Int64 => Value::from_array(x.mapv(|x_| x_ as i64))?.into_dyn(),
            TensorElementType::Uint8 => Value::from_array(x.mapv(|x_| x_ as u8))?.into_dyn(),
            TensorElementType::Bool => Value::from_array(x.mapv(|x_| x_ != 0.))?.into_dyn(),
            _ => bail!("Unsupported input tensor type: {:?}", dtype),
        };
        Ok(x)
    }

    /// Runs the graph. Inputs are matched to graph inputs by name, falling back to position
    /// for unnamed tensors. Every graph output is returned, converted to `f32`.
    pub fn engine_run(&mut self, xs: Xs) -> Result<Xs> {
        let t_pre = Instant::now();
        let mut xs = xs;
        let mut positional = Vec::new();
        let mut xs_ = Vec::new();
        for (i, (dtype, name)) in self
            .inputs_attrs
            .dtypes
            .iter()
            .zip(self.inputs_attrs.names.iter())
            .enumerate()
        {
            let x = match xs.take(name) {
                Some(x) => x,
                None => {
                    if positional.is_empty() {
                        positional = std::mem::take(&mut xs).into_iter().collect::<Vec<_>>();
                        positional.reverse();
                    }
                    match positional.pop() {
                        Some(x) => x,
                        None => bail!("Missing input #{i} `{name}` for graph {}", self.name),
                    }
                }
            };
            xs_.push(Into::<SessionInputValue<'_>>::into(Self::tensor_preprocess(
                &x, dtype,
            )?));
        }
        let t_pre = t_pre.elapsed();
        self.infer_time.add_or_push(0, t_pre);

        // run
        let t_run = Instant::now();
        let outputs = self.session.run(&xs_[..])?;
        let t_run = t_run.elapsed();
        self.infer_time.add_or_push(1, t_run);

        // extract
        let t_post = Instant::now();
        let mut ys = Xs::new();
        for (dtype, name) in self.outputs_attrs.dtypes.iter().zip(self.outputs_attrs.names.iter()) {
            let y = Self::tensor_postprocess(&outputs[name.as_str()], dtype)?;
            ys.push_kv(name.as_str(), X::from(y))?;
        }
        let t_post = t_post.elapsed();
        self.infer_time.add_or_push(2, t_post);

        if self.profile {
            log::debug!(
                "[Profile] {} | {:.4?} ({:.4?} avg) [alignment: {:.4?} | inference: {:.4?} | to_f32: {:.4?}]",
                self.name,
                t_pre + t_run + t_post,
                self.infer_time.avg(),
                t_pre,
                t_run,
                t_post,
            );
        }

        Ok(ys)
    }

    fn tensor_postprocess(x: &DynValue, dtype: &TensorElementType) -> Result<Array<f32, IxDyn>> {
        fn _extract_and_convert<T>(x: &DynValue, map_fn: impl Fn(T) -> f32) -> Result<Array<f32, IxDyn>>
        where
            T: Clone + 'static + ort::tensor::PrimitiveTensorElementType,
        {
            let view = x.try_extract_array::<T>()?;
            Ok(view.mapv(map_fn).into_owned())
        }
        let x = match dtype {
            TensorElementType::Float32 => _extract_and_convert::<f32>(x, |x| x)?,
            TensorElementType::Float16 => _extract_and_convert::<f16>(x, f16::to_f32)?,
            TensorElementType::Bfloat16 => _extract_and_convert::<bf16>(x, bf16::to_f32)?,
            TensorElementType::Float64 => _extract_and_convert::<f64>(x, |x| x as f32)?,
            TensorElementType::Int64 => _extract_and_convert::<i64>(x, |x| x as f32)?,
            TensorElementType::Int32 => _extract_and_convert::<i32>(x, |x| x as f32)?,
            TensorElementType::Uint8 => _extract_and_convert::<u8>(x, |x| x as f32)?,
            TensorElementType::Bool => _extract_and_convert::<bool>(x, |x| x as u8 as f32)?,
            _ => bail!("Unsupported ort tensor type: {:?}", dtype),
        };

        Ok(x)
    }

    fn build_inputs_minoptmax(inputs_attrs: &OrtTensorAttr, config: &ConfigOrt) -> Result<Vec<Vec<MinOptMax>>> {
        let ys = inputs_attrs
            .dimss
            .iter()
            .enumerate()
            .map(|(i, dims)| {
                dims.iter()
                    .enumerate()
                    .map(|(ii, &x)| {
                        if x != 0 {
                            return MinOptMax::from(x);
                        }
                        // dynamic axes: images are NCHW, everything else may also be empty
                        match (i, ii) {
                            (0, 0) => MinOptMax::from((1, 1, config.batch_size.max(1))),
                            (0, 2) => MinOptMax::from(config.model_height as usize),
                            (0, 3) => MinOptMax::from(config.model_width as usize),
                            _ => {
                                log::debug!(
                                    "Dynamic axis {} of input {} left unpinned, using 0..4096",
                                    ii + 1, i + 1
                                );
                                MinOptMax::from((0, 64, 4096))
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(ys)
    }

    fn nbytes_from_onnx_dtype_id(x: usize) -> usize {
        match x {
            7 | 11 | 13 => 8,     // i64, f64, u64
            1 | 6 | 12 => 4,      // f32, i32, u32
            10 | 16 | 5 | 4 => 2, // f16, bf16, i16, u16
            2 | 3 | 9 => 1,       // u8, i8, bool
            8 => 4,               // string(1~4)
            _ => 0,
        }
    }

    fn ort_dtype_from_onnx_dtype_id(value: i32) -> Option<TensorElementType> {
        match value {
            1 => Some(TensorElementType::Float32),
            2 => Some(TensorElementType::Uint8),
            3 => Some(TensorElementType::Int8),
            4 => Some(TensorElementType::Uint16),
            5 => Some(TensorElementType::Int16),
            6 => Some(TensorElementType::Int32),
            7 => Some(TensorElementType::Int64),
            8 => Some(TensorElementType::String),
            9 => Some(TensorElementType::Bool),
            10 => Some(TensorElementType::Float16),
            11 => Some(TensorElementType::Float64),
            12 => Some(TensorElementType::Uint32),
            13 => Some(TensorElementType::Uint64),
            16 => Some(TensorElementType::Bfloat16),
            _ => None,
        }
    }

    pub(crate) fn io_from_onnx_value_info(
        initializer_names: &HashSet<&str>,
        value_info: &[onnx::ValueInfoProto],
    ) -> Result<OrtTensorAttr> {
        let mut dimss: Vec<Vec<usize>> = Vec::new();
        let mut dtypes: Vec<TensorElementType> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for v in value_info.iter() {
            if initializer_names.contains(v.name.as_str()) {
                continue;
            }
            let tensor = match v.r#type.as_ref().and_then(|t| t.value.as_ref()) {
                Some(onnx::type_proto::Value::TensorType(tensor)) => tensor,
                None => continue,
            };
            let tensor_type = match Self::ort_dtype_from_onnx_dtype_id(tensor.elem_type) {
                Some(dtype) => dtype,
                None => continue,
            };

            let mut shape_: Vec<usize> = Vec::new();
            if let Some(shapes) = &tensor.shape {
                for shape in shapes.dim.iter() {
                    match &shape.value {
                        Some(onnx::tensor_shape_proto::dimension::Value::DimValue(x)) => {
                            shape_.push(*x as _);
                        }
                        Some(onnx::tensor_shape_proto::dimension::Value::DimParam(_)) | None => {
                            shape_.push(0);
                        }
                    }
                }
            }
            names.push(v.name.to_string());
            dtypes.push(tensor_type);
            dimss.push(shape_);
        }
        Ok(OrtTensorAttr {
            dimss,
            dtypes,
            names,
        })
    }

    pub fn load_onnx<P: AsRef<Path>>(p: P) -> Result<onnx::ModelProto> {
        let f = std::fs::read(p.as_ref())?;
        onnx::ModelProto::decode(f.as_slice())
            .map_err(|e| anyhow::anyhow!("Failed to decode ONNX model {}: {}", p.as_ref().display(), e))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn out_names(&self) -> &Vec<String> {
        &self.outputs_attrs.names
    }

    pub fn in_dimss(&self) -> &Vec<Vec<usize>> {
        &self.inputs_attrs.dimss
    }

    pub fn in_names(&self) -> &Vec<String> {
        &self.inputs_attrs.names
    }

    pub fn device(&self) -> InferenceDevice {
        self.device
    }

    pub fn is_batch_dyn(&self) -> bool {
        self.in_dimss().first().and_then(|d| d.first()) == Some(&0)
    }

    /// Custom metadata property of the graph, e.g. `names` or `stride`.
    pub fn try_fetch(&self, key: &str) -> Option<String> {
        self.model_proto
            .metadata_props
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.clone())
    }

    pub fn opset_version(&self) -> usize {
        self.model_proto.opset_import.first().map(|o| o.version as usize).unwrap_or_default()
    }
}
