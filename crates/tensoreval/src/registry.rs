//! Name-based lookup of losses and metrics.
//!
//! Identifiers are JSON values: a string resolves a canonical name or alias,
//! and an object `{"class_name": ..., "config": {...}}` builds an instance from
//! a typed configuration. Unknown names resolve to `None` so callers can fall
//! back to another strategy.

use crate::config::{LossConfig, MetricConfig};
use crate::losses::{
    BinaryCrossentropy, CategoricalCrossentropy, CategoricalHinge, CosineSimilarity, Hinge,
    Huber, KLDivergence, LabelEncoding, LogCosh, Loss, MeanAbsoluteError,
    MeanAbsolutePercentageError, MeanSquaredError, MeanSquaredLogarithmicError, Poisson,
    SparseCategoricalCrossentropy, SquaredHinge,
};
use crate::metrics::{
    accuracy, binary_accuracy, categorical_accuracy, sparse_categorical_accuracy,
    sparse_top_k_categorical_accuracy, top_k_categorical_accuracy, Auc, AucCurve,
    AucSummationMethod, FalseNegatives, FalsePositives, MeanMetricWrapper, Metric, Precision,
    Recall, SensitivityAtSpecificity, SpecificityAtSensitivity, TrueNegatives, TruePositives,
    DEFAULT_CURVE_THRESHOLDS, DEFAULT_TOP_K,
};
use crate::{EvalError, EvalResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an instance from its JSON configuration (`Value::Null` for defaults).
pub type Factory<T> = Arc<dyn Fn(&Value) -> EvalResult<Box<T>> + Send + Sync>;

/// Caller-supplied constructors consulted before the built-in catalog.
pub struct CustomObjects<T: ?Sized> {
    entries: HashMap<String, Factory<T>>,
}

impl<T: ?Sized> Default for CustomObjects<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: ?Sized> CustomObjects<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> EvalResult<Box<T>> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<&Factory<T>> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Catalog of constructors keyed by canonical name, with aliases.
pub struct Registry<T: ?Sized> {
    family: &'static str,
    factories: HashMap<String, Factory<T>>,
    aliases: HashMap<String, String>,
}

/// Registry of loss constructors.
pub type LossRegistry = Registry<dyn Loss>;

/// Registry of metric constructors.
pub type MetricRegistry = Registry<dyn Metric>;

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry for a family of objects ("loss", "metric").
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            factories: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Register a constructor under its canonical name.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value) -> EvalResult<Box<T>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Make `alias` resolve to `canonical`.
    pub fn alias(&mut self, alias: &str, canonical: &str) {
        self.aliases.insert(alias.to_string(), canonical.to_string());
    }

    /// Canonical name for a registered name or alias.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.factories.contains_key(name) {
            return Some(name);
        }
        self.aliases.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.canonical_name(name).is_some()
    }

    /// Sorted canonical names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn factory<'a>(
        &'a self,
        name: &str,
        custom: Option<&'a CustomObjects<T>>,
    ) -> Option<&'a Factory<T>> {
        if let Some(factory) = custom.and_then(|c| c.get(name)) {
            return Some(factory);
        }
        let canonical = self.canonical_name(name)?;
        self.factories.get(canonical)
    }

    /// Build the object registered as `name` with its default configuration.
    pub fn get(
        &self,
        name: &str,
        custom: Option<&CustomObjects<T>>,
    ) -> EvalResult<Option<Box<T>>> {
        self.build(name, &Value::Null, custom)
    }

    fn build(
        &self,
        name: &str,
        config: &Value,
        custom: Option<&CustomObjects<T>>,
    ) -> EvalResult<Option<Box<T>>> {
        match self.factory(name, custom) {
            Some(factory) => factory(config).map(Some),
            None => {
                log::debug!("No {} registered under '{}'", self.family, name);
                Ok(None)
            }
        }
    }

    /// Resolve a JSON identifier.
    pub fn deserialize(
        &self,
        identifier: &Value,
        custom: Option<&CustomObjects<T>>,
    ) -> EvalResult<Option<Box<T>>> {
        match identifier {
            Value::String(name) => self.get(name, custom),
            Value::Object(map) => {
                let class_name = map.get("class_name").and_then(Value::as_str).ok_or_else(|| {
                    EvalError::InvalidArgument(format!(
                        "{} identifier object needs a string 'class_name'",
                        self.family
                    ))
                })?;
                let config = map.get("config").unwrap_or(&Value::Null);
                self.build(class_name, config, custom)
            }
            other => Err(EvalError::InvalidArgument(format!(
                "Could not interpret {} identifier: {}",
                self.family, other
            ))),
        }
    }
}

/// Decode `config` into `C`, treating `null` as the default.
fn decode<C: DeserializeOwned + Default>(config: &Value) -> EvalResult<C> {
    if config.is_null() {
        return Ok(C::default());
    }
    Ok(serde_json::from_value(config.clone())?)
}

/// Loss parameters beyond [`LossConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LossExtras {
    delta: Option<f64>,
    label_encoding: LabelEncoding,
}

/// Metric parameters beyond [`MetricConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetricExtras {
    threshold: Option<f64>,
    k: Option<usize>,
    specificity: Option<f64>,
    sensitivity: Option<f64>,
    num_thresholds: Option<usize>,
    curve: AucCurve,
    summation_method: AucSummationMethod,
}

macro_rules! register_config_loss {
    ($registry:ident, $name:literal, $ty:ident) => {
        $registry.register($name, |config: &Value| {
            Ok(Box::new($ty::new(decode::<LossConfig>(config)?)?) as Box<dyn Loss>)
        });
    };
}

/// Canonical name of a loss instance, for writing configurations.
pub fn serialize_name(loss: &dyn Loss) -> &'static str {
    loss.canonical_name()
}

impl Registry<dyn Loss> {
    /// Registry holding every built-in loss.
    pub fn with_standard_losses() -> Self {
        let mut registry = Self::new("loss");

        register_config_loss!(registry, "mean_squared_error", MeanSquaredError);
        register_config_loss!(registry, "mean_absolute_error", MeanAbsoluteError);
        register_config_loss!(
            registry,
            "mean_absolute_percentage_error",
            MeanAbsolutePercentageError
        );
        register_config_loss!(
            registry,
            "mean_squared_logarithmic_error",
            MeanSquaredLogarithmicError
        );
        register_config_loss!(registry, "binary_crossentropy", BinaryCrossentropy);
        register_config_loss!(registry, "categorical_crossentropy", CategoricalCrossentropy);
        register_config_loss!(
            registry,
            "sparse_categorical_crossentropy",
            SparseCategoricalCrossentropy
        );
        register_config_loss!(registry, "categorical_hinge", CategoricalHinge);
        register_config_loss!(registry, "cosine_similarity", CosineSimilarity);
        register_config_loss!(registry, "log_cosh", LogCosh);
        register_config_loss!(registry, "poisson", Poisson);
        register_config_loss!(registry, "kl_divergence", KLDivergence);

        registry.register("hinge", |config: &Value| {
            let extras: LossExtras = decode(config)?;
            Ok(Box::new(Hinge::new(decode(config)?, extras.label_encoding)?) as Box<dyn Loss>)
        });
        registry.register("squared_hinge", |config: &Value| {
            let extras: LossExtras = decode(config)?;
            Ok(Box::new(SquaredHinge::new(decode(config)?, extras.label_encoding)?)
                as Box<dyn Loss>)
        });
        registry.register("huber", |config: &Value| {
            let extras: LossExtras = decode(config)?;
            let delta = extras.delta.unwrap_or(1.0);
            Ok(Box::new(Huber::new(decode(config)?, delta)?) as Box<dyn Loss>)
        });

        for (alias, canonical) in [
            ("mse", "mean_squared_error"),
            ("mae", "mean_absolute_error"),
            ("mape", "mean_absolute_percentage_error"),
            ("msle", "mean_squared_logarithmic_error"),
            ("kld", "kl_divergence"),
            ("kullback_leibler_divergence", "kl_divergence"),
            ("logcosh", "log_cosh"),
            ("huber_loss", "huber"),
        ] {
            registry.alias(alias, canonical);
        }
        registry
    }
}

impl Registry<dyn Metric> {
    /// Registry holding every built-in metric.
    ///
    /// Every built-in loss is also available as a metric that tracks its mean.
    pub fn with_standard_metrics() -> Self {
        let mut registry = Self::new("metric");

        registry.register("accuracy", |config: &Value| {
            let name = decode::<MetricConfig>(config)?.name;
            let name = name.unwrap_or_else(|| "accuracy".to_string());
            Ok(Box::new(MeanMetricWrapper::new(name, accuracy)) as Box<dyn Metric>)
        });
        registry.register("binary_accuracy", |config: &Value| {
            let name = decode::<MetricConfig>(config)?.name;
            let threshold = decode::<MetricExtras>(config)?
                .threshold
                .unwrap_or(crate::config::DEFAULT_THRESHOLD);
            let name = name.unwrap_or_else(|| "binary_accuracy".to_string());
            Ok(Box::new(MeanMetricWrapper::new(name, move |t, p| {
                binary_accuracy(t, p, threshold)
            })) as Box<dyn Metric>)
        });
        registry.register("categorical_accuracy", |config: &Value| {
            let name = decode::<MetricConfig>(config)?.name;
            let name = name.unwrap_or_else(|| "categorical_accuracy".to_string());
            Ok(Box::new(MeanMetricWrapper::new(name, categorical_accuracy)) as Box<dyn Metric>)
        });
        registry.register("sparse_categorical_accuracy", |config: &Value| {
            let name = decode::<MetricConfig>(config)?.name;
            let name = name.unwrap_or_else(|| "sparse_categorical_accuracy".to_string());
            Ok(Box::new(MeanMetricWrapper::new(name, sparse_categorical_accuracy))
                as Box<dyn Metric>)
        });
        registry.register("top_k_categorical_accuracy", |config: &Value| {
            let name = decode::<MetricConfig>(config)?.name;
            let k = decode::<MetricExtras>(config)?.k.unwrap_or(DEFAULT_TOP_K);
            let name = name.unwrap_or_else(|| "top_k_categorical_accuracy".to_string());
            Ok(Box::new(MeanMetricWrapper::new(name, move |t, p| {
                top_k_categorical_accuracy(t, p, k)
            })) as Box<dyn Metric>)
        });
        registry.register("sparse_top_k_categorical_accuracy", |config: &Value| {
            let name = decode::<MetricConfig>(config)?.name;
            let k = decode::<MetricExtras>(config)?.k.unwrap_or(DEFAULT_TOP_K);
            let name = name.unwrap_or_else(|| "sparse_top_k_categorical_accuracy".to_string());
            Ok(Box::new(MeanMetricWrapper::new(name, move |t, p| {
                sparse_top_k_categorical_accuracy(t, p, k)
            })) as Box<dyn Metric>)
        });

        registry.register("true_positives", |config: &Value| {
            Ok(Box::new(TruePositives::new(decode(config)?)?) as Box<dyn Metric>)
        });
        registry.register("false_positives", |config: &Value| {
            Ok(Box::new(FalsePositives::new(decode(config)?)?) as Box<dyn Metric>)
        });
        registry.register("true_negatives", |config: &Value| {
            Ok(Box::new(TrueNegatives::new(decode(config)?)?) as Box<dyn Metric>)
        });
        registry.register("false_negatives", |config: &Value| {
            Ok(Box::new(FalseNegatives::new(decode(config)?)?) as Box<dyn Metric>)
        });
        registry.register("precision", |config: &Value| {
            Ok(Box::new(Precision::new(decode(config)?)?) as Box<dyn Metric>)
        });
        registry.register("recall", |config: &Value| {
            Ok(Box::new(Recall::new(decode(config)?)?) as Box<dyn Metric>)
        });
        registry.register("sensitivity_at_specificity", |config: &Value| {
            let base: MetricConfig = decode(config)?;
            let extras: MetricExtras = decode(config)?;
            let specificity = extras.specificity.ok_or_else(|| {
                EvalError::InvalidConfig(
                    "sensitivity_at_specificity requires 'specificity'".to_string(),
                )
            })?;
            Ok(Box::new(SensitivityAtSpecificity::with_options(
                specificity,
                extras.num_thresholds.unwrap_or(DEFAULT_CURVE_THRESHOLDS),
                base.class_id,
                base.name,
            )?) as Box<dyn Metric>)
        });
        registry.register("specificity_at_sensitivity", |config: &Value| {
            let base: MetricConfig = decode(config)?;
            let extras: MetricExtras = decode(config)?;
            let sensitivity = extras.sensitivity.ok_or_else(|| {
                EvalError::InvalidConfig(
                    "specificity_at_sensitivity requires 'sensitivity'".to_string(),
                )
            })?;
            Ok(Box::new(SpecificityAtSensitivity::with_options(
                sensitivity,
                extras.num_thresholds.unwrap_or(DEFAULT_CURVE_THRESHOLDS),
                base.class_id,
                base.name,
            )?) as Box<dyn Metric>)
        });
        registry.register("auc", |config: &Value| {
            let base: MetricConfig = decode(config)?;
            let extras: MetricExtras = decode(config)?;
            let auc = Auc::new(
                extras.num_thresholds.unwrap_or(DEFAULT_CURVE_THRESHOLDS),
                extras.curve,
                extras.summation_method,
            )?;
            let auc = match base.name {
                Some(name) => auc.with_name(name),
                None => auc,
            };
            Ok(Box::new(auc) as Box<dyn Metric>)
        });

        let losses = LossRegistry::with_standard_losses();
        for name in losses.names() {
            let loss_factory = losses.factories[name].clone();
            registry.register(name, move |config: &Value| {
                let loss = loss_factory(config)?;
                let name = loss.name().to_string();
                Ok(Box::new(MeanMetricWrapper::new(name, move |t, p| {
                    loss.per_example(t, p)
                })) as Box<dyn Metric>)
            });
        }
        for (alias, canonical) in losses.aliases.iter() {
            registry.alias(alias, canonical);
        }
        registry.alias("acc", "accuracy");

        registry
    }
}
