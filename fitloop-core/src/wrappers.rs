//! Unwrapping a user model from its data-parallel wrappers.
//!
//! ## Feature Gating
//!
//! The plain data-parallel containers and the framework's own module wrapper
//! are always available. Sharded data parallel requires the `sharded` feature;
//! fully sharded data parallel and its flattened-parameters buffer require
//! `full-sharded`. Without a backend its variants and unwrap functions do not
//! exist, and [`unwrap_model`] simply skips those steps.

use crate::error::WrapperError;

/// A model, possibly nested inside distributed-training wrapper layers.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelWrapper<M> {
    /// The user model itself.
    Module(M),
    /// The framework's wrapper that forwards step calls to the user model.
    ModuleWrapper(Box<ModelWrapper<M>>),
    DataParallel(Box<ModelWrapper<M>>),
    DistributedDataParallel(Box<ModelWrapper<M>>),
    #[cfg(feature = "sharded")]
    ShardedDataParallel(Box<ModelWrapper<M>>),
    #[cfg(feature = "full-sharded")]
    FullyShardedDataParallel(Box<ModelWrapper<M>>),
    /// Flattened-parameters buffer placed inside a fully sharded wrapper.
    #[cfg(feature = "full-sharded")]
    FlattenParams(Box<ModelWrapper<M>>),
}

impl<M> ModelWrapper<M> {
    pub fn new(model: M) -> Self {
        ModelWrapper::Module(model)
    }

    pub fn in_module_wrapper(self) -> Self {
        ModelWrapper::ModuleWrapper(Box::new(self))
    }

    pub fn in_data_parallel(self) -> Self {
        ModelWrapper::DataParallel(Box::new(self))
    }

    pub fn in_distributed_data_parallel(self) -> Self {
        ModelWrapper::DistributedDataParallel(Box::new(self))
    }

    #[cfg(feature = "sharded")]
    pub fn in_sharded(self) -> Self {
        ModelWrapper::ShardedDataParallel(Box::new(self))
    }

    #[cfg(feature = "full-sharded")]
    pub fn in_fully_sharded(self) -> Self {
        ModelWrapper::FullyShardedDataParallel(Box::new(self))
    }

    #[cfg(feature = "full-sharded")]
    pub fn in_flatten_params(self) -> Self {
        ModelWrapper::FlattenParams(Box::new(self))
    }

    /// Name of the outermost layer.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelWrapper::Module(_) => "module",
            ModelWrapper::ModuleWrapper(_) => "module_wrapper",
            ModelWrapper::DataParallel(_) => "data_parallel",
            ModelWrapper::DistributedDataParallel(_) => "distributed_data_parallel",
            #[cfg(feature = "sharded")]
            ModelWrapper::ShardedDataParallel(_) => "sharded_data_parallel",
            #[cfg(feature = "full-sharded")]
            ModelWrapper::FullyShardedDataParallel(_) => "fully_sharded_data_parallel",
            #[cfg(feature = "full-sharded")]
            ModelWrapper::FlattenParams(_) => "flatten_params",
        }
    }

    /// The wrapped layer, or `None` for the bare model.
    pub fn inner(&self) -> Option<&ModelWrapper<M>> {
        match self {
            ModelWrapper::Module(_) => None,
            ModelWrapper::ModuleWrapper(inner)
            | ModelWrapper::DataParallel(inner)
            | ModelWrapper::DistributedDataParallel(inner) => Some(inner.as_ref()),
            #[cfg(feature = "sharded")]
            ModelWrapper::ShardedDataParallel(inner) => Some(inner.as_ref()),
            #[cfg(feature = "full-sharded")]
            ModelWrapper::FullyShardedDataParallel(inner) | ModelWrapper::FlattenParams(inner) => {
                Some(inner.as_ref())
            }
        }
    }

    /// Number of wrapper layers around the model.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut layer = self;
        while let Some(inner) = layer.inner() {
            depth += 1;
            layer = inner;
        }
        depth
    }

    /// Borrow the user model through any number of layers.
    pub fn innermost(&self) -> &M {
        let mut layer = self;
        loop {
            match layer {
                ModelWrapper::Module(model) => return model,
                ModelWrapper::ModuleWrapper(inner)
                | ModelWrapper::DataParallel(inner)
                | ModelWrapper::DistributedDataParallel(inner) => layer = inner.as_ref(),
                #[cfg(feature = "sharded")]
                ModelWrapper::ShardedDataParallel(inner) => layer = inner.as_ref(),
                #[cfg(feature = "full-sharded")]
                ModelWrapper::FullyShardedDataParallel(inner)
                | ModelWrapper::FlattenParams(inner) => layer = inner.as_ref(),
            }
        }
    }
}

pub const fn sharded_available() -> bool {
    cfg!(feature = "sharded")
}

pub const fn full_sharded_available() -> bool {
    cfg!(feature = "full-sharded")
}

/// Peel the framework-level layers: one data-parallel container, then the
/// framework's module wrapper.
pub fn unwrap_module<M>(model: ModelWrapper<M>) -> Result<M, WrapperError> {
    let model = match model {
        ModelWrapper::DataParallel(inner) | ModelWrapper::DistributedDataParallel(inner) => *inner,
        other => other,
    };
    let model = match model {
        ModelWrapper::ModuleWrapper(inner) => *inner,
        other => other,
    };
    match model {
        ModelWrapper::Module(m) => Ok(m),
        other => {
            tracing::warn!(kind = other.kind(), "model still wrapped after unwrapping");
            Err(WrapperError::UnexpectedWrapper { kind: other.kind() })
        }
    }
}

#[cfg(feature = "sharded")]
fn peel_sharded<M>(model: ModelWrapper<M>) -> ModelWrapper<M> {
    match model {
        ModelWrapper::ShardedDataParallel(inner) => *inner,
        other => other,
    }
}

#[cfg(feature = "full-sharded")]
fn peel_full_sharded<M>(model: ModelWrapper<M>) -> ModelWrapper<M> {
    let model = match model {
        ModelWrapper::FullyShardedDataParallel(inner) => *inner,
        other => other,
    };
    match model {
        ModelWrapper::FlattenParams(inner) => *inner,
        other => other,
    }
}

/// Unwrap a model trained with sharded data parallel.
#[cfg(feature = "sharded")]
pub fn unwrap_sharded<M>(model: ModelWrapper<M>) -> Result<M, WrapperError> {
    unwrap_module(peel_sharded(model))
}

/// Unwrap a model trained with fully sharded data parallel, including its
/// flattened-parameters buffer.
#[cfg(feature = "full-sharded")]
pub fn unwrap_full_sharded<M>(model: ModelWrapper<M>) -> Result<M, WrapperError> {
    unwrap_module(peel_full_sharded(model))
}

/// Return the user model from behind whichever wrappers the enabled backends
/// know about.
pub fn unwrap_model<M>(model: ModelWrapper<M>) -> Result<M, WrapperError> {
    #[cfg(feature = "sharded")]
    let model = peel_sharded(model);
    #[cfg(feature = "full-sharded")]
    let model = peel_full_sharded(model);
    unwrap_module(model)
}
