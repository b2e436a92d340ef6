use burn::{
    nn::{
        Dropout, DropoutConfig,
        conv::{Conv2d, Conv2dConfig},
    },
    prelude::*,
};

use super::blocks::{
    ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
};
use super::error::ModelConfigError;

/// Classic U-Net: an encoder trunk, a bottleneck, a decoder chain consuming
/// the encoder skip maps in reverse order, and a 1x1 projection to class
/// logits. Depth and per-stage widths come from the filter schedule.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    encoders: Vec<EncoderBlock<B>>,
    bottleneck: ConvBlock<B>,
    dropout: Dropout,
    decoders: Vec<DecoderBlock<B>>,
    conv_1x1: Conv2d<B>,

    input_channels: usize,
    num_classes: usize,
}

#[derive(Config, Debug)]
pub struct UNetConfig {
    input_channels: usize,
    num_classes: usize,
    /// Filter schedule: one entry per encoder stage plus the bottleneck
    /// width as the last entry. Entries must double stage over stage.
    num_filters: Vec<usize>,
    #[config(default = "0.1")]
    dropout: f64,
}

impl UNetConfig {
    /// Number of encoder (and decoder) stages the schedule defines.
    pub fn depth(&self) -> usize {
        self.num_filters.len().saturating_sub(1)
    }

    pub fn try_validate(&self) -> Result<(), ModelConfigError> {
        validate_trunk(self.input_channels, self.num_classes, &self.num_filters)
    }

    /// # Panics
    ///
    /// If [`Self::try_validate`] fails.
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }

        UNet {
            encoders: init_encoders(self.input_channels, &self.num_filters, device),
            bottleneck: init_bottleneck(&self.num_filters, device),
            dropout: DropoutConfig::new(self.dropout).init(),
            decoders: init_decoders(&self.num_filters, device),
            conv_1x1: Conv2dConfig::new([self.num_filters[0], self.num_classes], [1, 1])
                .init(device),
            input_channels: self.input_channels,
            num_classes: self.num_classes,
        }
    }
}

impl<B: Backend> UNet<B> {
    /// Number of encoder (and decoder) stages.
    pub fn depth(&self) -> usize {
        self.encoders.len()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Maps `(batch, input_channels, h, w)` to `(batch, num_classes, h, w)`
    /// raw logits. `h` and `w` must be divisible by `2^depth`.
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
        let mut x = self.dropout.forward(x);

        // skips are consumed in reverse of production order
        for (decoder, skip_features) in self.decoders.iter().zip(skips.into_iter().rev()) {
            x = decoder.forward(x, skip_features);
        }

        self.conv_1x1.forward(x)
    }
}

pub(super) fn validate_trunk(
    input_channels: usize,
    num_classes: usize,
    num_filters: &[usize],
) -> Result<(), ModelConfigError> {
    if input_channels == 0 {
        return Err(ModelConfigError::ZeroInputChannels);
    }
    if num_classes == 0 {
        return Err(ModelConfigError::ZeroNumClasses);
    }
    if num_filters.len() < 2 {
        return Err(ModelConfigError::ScheduleTooShort {
            got: num_filters.len(),
        });
    }
    if let Some(index) = num_filters.iter().position(|&filters| filters == 0) {
        return Err(ModelConfigError::ZeroScheduleEntry { index });
    }
    for index in 1..num_filters.len() {
        let expected = num_filters[index - 1] * 2;
        if num_filters[index] != expected {
            return Err(ModelConfigError::ScheduleNotDoubling {
                index,
                expected,
                got: num_filters[index],
            });
        }
    }

    Ok(())
}

pub(super) fn init_encoders<B: Backend>(
    input_channels: usize,
    num_filters: &[usize],
    device: &B::Device,
) -> Vec<EncoderBlock<B>> {
    num_filters[..num_filters.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, &filters)| {
            let in_channels = if i == 0 { input_channels } else { num_filters[i - 1] };
            EncoderBlockConfig::new(ConvBlockConfig::new(in_channels, filters)).init(device)
        })
        .collect()
}

pub(super) fn init_bottleneck<B: Backend>(
    num_filters: &[usize],
    device: &B::Device,
) -> ConvBlock<B> {
    ConvBlockConfig::new(
        num_filters[num_filters.len() - 2],
        num_filters[num_filters.len() - 1],
    )
    .init(device)
}

/// One [`DecoderBlock`] per adjacent pair of the reversed schedule.
pub(super) fn init_decoders<B: Backend>(
    num_filters: &[usize],
    device: &B::Device,
) -> Vec<DecoderBlock<B>> {
    let reversed: Vec<usize> = num_filters.iter().rev().copied().collect();

    reversed
        .windows(2)
        .map(|pair| DecoderBlockConfig::new(pair[0], pair[1]).init(device))
        .collect()
}

pub(super) fn check_input_shape(dims: [usize; 4], input_channels: usize, depth: usize) {
    let [_, channels, height, width] = dims;
    assert!(
        channels == input_channels,
        "expected {input_channels} input channels, got {channels}"
    );

    let factor = 1usize << depth;
    assert!(
        height % factor == 0 && width % factor == 0,
        "input spatial size {height}x{width} must be divisible by {factor} to survive {depth} pooling stages"
    );
}
