//! Pretrained ResNet-18 through libtorch.
//!
//! One weights file (tch `VarStore` format, e.g. converted torchvision
//! IMAGENET1K_V1 weights) backs two networks: the full classifier and the
//! same backbone with the final fully connected layer removed, whose 512-wide
//! pooled output is the embedding.

use super::{preprocess, to_chw, Classifier, EmbeddingProvider, INPUT_SIZE};
use crate::error::{BreedSearchError, Result};
use crate::vector::Vector;
use image::DynamicImage;
use std::path::Path;
use std::sync::Mutex;
use tch::nn::{FuncT, ModuleT, VarStore};
use tch::{Device, Kind, Tensor};

const EMBEDDING_DIM: usize = 512;
const IMAGENET_CLASSES: i64 = 1000;

pub struct ResNet18 {
    device: Device,
    // FuncT is Send but not Sync.
    classifier: Mutex<FuncT<'static>>,
    backbone: Mutex<FuncT<'static>>,
    _stores: (VarStore, VarStore),
}

fn model_error(e: tch::TchError) -> BreedSearchError {
    BreedSearchError::ModelError(e.to_string())
}

impl ResNet18 {
    pub fn load(weights: impl AsRef<Path>) -> Result<Self> {
        let device = Device::cuda_if_available();

        let mut full_vs = VarStore::new(device);
        let classifier = tch::vision::resnet::resnet18(&full_vs.root(), IMAGENET_CLASSES);
        full_vs.load(weights.as_ref()).map_err(model_error)?;

        let mut backbone_vs = VarStore::new(device);
        let backbone = tch::vision::resnet::resnet18_no_final_layer(&backbone_vs.root());
        backbone_vs.load(weights.as_ref()).map_err(model_error)?;

        log::info!(
            "Loaded ResNet-18 weights from {} on {:?}",
            weights.as_ref().display(),
            device
        );
        Ok(Self {
            device,
            classifier: Mutex::new(classifier),
            backbone: Mutex::new(backbone),
            _stores: (full_vs, backbone_vs),
        })
    }

    /// `[1, 3, 224, 224]` input in `[0, 1]`, without mean/std normalization.
    fn input(&self, image: &DynamicImage) -> Tensor {
        let data = to_chw(&preprocess(image));
        let side = INPUT_SIZE as i64;
        Tensor::of_slice(&data)
            .view([1, 3, side, side])
            .to_kind(Kind::Float)
            .to(self.device)
    }

    fn run(&self, net: &Mutex<FuncT<'static>>, image: &DynamicImage) -> Result<Vec<f32>> {
        let input = self.input(image);
        let net = net
            .lock()
            .map_err(|_| BreedSearchError::ModelError("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| net.forward_t(&input, false));
        Vec::<f32>::try_from(output.flatten(0, -1).to(Device::Cpu)).map_err(model_error)
    }
}

impl EmbeddingProvider for ResNet18 {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed(&self, image: &DynamicImage) -> Result<Vector> {
        let values = self.run(&self.backbone, image)?;
        if values.len() != EMBEDDING_DIM {
            return Err(BreedSearchError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: values.len(),
            });
        }
        Ok(Vector::new(values))
    }
}

impl Classifier for ResNet18 {
    fn num_classes(&self) -> usize {
        IMAGENET_CLASSES as usize
    }

    fn logits(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        self.run(&self.classifier, image)
    }
}
