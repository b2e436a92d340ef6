use burn::{
    nn::{
        Dropout, DropoutConfig,
        conv::{Conv2d, Conv2dConfig},
    },
    prelude::*,
};

use super::blocks::{ConvBlock, DecoderBlock, EncoderBlock};
use super::error::ModelConfigError;
use super::unet::{check_input_shape, init_bottleneck, init_decoders, init_encoders, validate_trunk};

/// U-Net with a single encoder trunk and two independent decoder legs.
///
/// Both legs consume the same skip maps and the same bottleneck output,
/// each projects to `num_classes / 2` logit channels, and the two results
/// are concatenated along the channel axis.
#[derive(Module, Debug)]
pub struct TwoLeggedUNet<B: Backend> {
    encoders: Vec<EncoderBlock<B>>,
    bottleneck: ConvBlock<B>,
    dropout: Dropout,
    decoders1: Vec<DecoderBlock<B>>,
    decoders2: Vec<DecoderBlock<B>>,
    conv_1x1_leg1: Conv2d<B>,
    conv_1x1_leg2: Conv2d<B>,

    input_channels: usize,
    num_classes: usize,
}

#[derive(Config, Debug)]
pub struct TwoLeggedUNetConfig {
    input_channels: usize,
    /// Total logit channels, split evenly across the two legs. Must be even.
    num_classes: usize,
    num_filters: Vec<usize>,
    #[config(default = "0.1")]
    dropout: f64,
}

impl TwoLeggedUNetConfig {
    /// Number of encoder (and per-leg decoder) stages the schedule defines.
    pub fn depth(&self) -> usize {
        self.num_filters.len().saturating_sub(1)
    }

    pub fn try_validate(&self) -> Result<(), ModelConfigError> {
        validate_trunk(self.input_channels, self.num_classes, &self.num_filters)?;
        if self.num_classes % 2 != 0 {
            return Err(ModelConfigError::OddNumClasses {
                got: self.num_classes,
            });
        }

        Ok(())
    }

    /// # Panics
    ///
    /// If [`Self::try_validate`] fails.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TwoLeggedUNet<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }

        let leg_classes = self.num_classes / 2;

        TwoLeggedUNet {
            encoders: init_encoders(self.input_channels, &self.num_filters, device),
            bottleneck: init_bottleneck(&self.num_filters, device),
            dropout: DropoutConfig::new(self.dropout).init(),
            decoders1: init_decoders(&self.num_filters, device),
            decoders2: init_decoders(&self.num_filters, device),
            conv_1x1_leg1: Conv2dConfig::new([self.num_filters[0], leg_classes], [1, 1])
                .init(device),
            conv_1x1_leg2: Conv2dConfig::new([self.num_filters[0], leg_classes], [1, 1])
                .init(device),
            input_channels: self.input_channels,
            num_classes: self.num_classes,
        }
    }
}

impl<B: Backend> TwoLeggedUNet<B> {
    /// Number of encoder (and per-leg decoder) stages.
    pub fn depth(&self) -> usize {
        self.encoders.len()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Maps `(batch, input_channels, h, w)` to `(batch, num_classes, h, w)`
    /// raw logits, the first half produced by leg 1 and the second by leg 2.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        check_input_shape(input.dims(), self.input_channels, self.depth());

        let mut x = input;
        let mut skips = Vec::with_capacity(self.encoders.len());
        for encoder in &self.encoders {
            let (skip_features, pooled) = encoder.forward(x);
            skips.push(skip_features);
            x = pooled;
        }

        let x = self.bottleneck.forward(x);
        let x = self.dropout.forward(x);

        // Skip tensors are read-only here; each leg gets its own handle.
        let mut x1 = x.clone();
        for (decoder, skip_features) in self.decoders1.iter().zip(skips.iter().rev()) {
            x1 = decoder.forward(x1, skip_features.clone());
        }
        let x1 = self.conv_1x1_leg1.forward(x1);

        let mut x2 = x;
        for (decoder, skip_features) in self.decoders2.iter().zip(skips.iter().rev()) {
            x2 = decoder.forward(x2, skip_features.clone());
        }
        let x2 = self.conv_1x1_leg2.forward(x2);

        Tensor::cat(vec![x1, x2], 1)
    }
}
