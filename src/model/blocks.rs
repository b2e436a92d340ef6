use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Relu,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::MaxPool2d,
    },
    prelude::*,
};
use nn::{PaddingConfig2d, pool::MaxPool2dConfig};

/// Two rounds of 3x3 same-padded convolution, batch normalization and ReLU.
/// Spatial size is preserved; only the channel count changes.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    norm1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    norm2: BatchNorm<B, 2>,
    activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = self.norm1.forward(x);
        let x = self.activation.forward(x);
        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);

        self.activation.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    input_channels: usize,
    num_filters: usize,
}

impl ConvBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        ConvBlock {
            conv1: Conv2dConfig::new([self.input_channels, self.num_filters], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            norm1: BatchNormConfig::new(self.num_filters).init(device),
            conv2: Conv2dConfig::new([self.num_filters, self.num_filters], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            norm2: BatchNormConfig::new(self.num_filters).init(device),
            activation: Relu::new(),
        }
    }
}

/// A [`ConvBlock`] followed by 2x2 stride-2 max-pooling. Returns the
/// pre-pool feature map (the skip connection value) alongside the pooled map.
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    conv_block: ConvBlock<B>,
    max_pool: MaxPool2d,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let skip_features = self.conv_block.forward(x);
        let x = self.max_pool.forward(skip_features.clone());

        (skip_features, x)
    }
}

#[derive(Config, Debug)]
pub struct EncoderBlockConfig {
    conv_block: ConvBlockConfig,
}

impl EncoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            conv_block: self.conv_block.init(device),
            max_pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

/// Transposed-convolution upsample to half the channels and double the
/// spatial size, concatenation with the skip feature map, then a fusing
/// [`ConvBlock`].
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    conv_transpose: ConvTranspose2d<B>,
    conv_block: ConvBlock<B>,
}

impl<B: Backend> DecoderBlock<B> {
    /// The skip map must carry `input_channels / 2` channels at exactly
    /// double the spatial size of `x`.
    pub fn forward(&self, x: Tensor<B, 4>, skip_features: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv_transpose.forward(x);

        let [_, _, height, width] = x.dims();
        let [_, _, skip_height, skip_width] = skip_features.dims();
        assert!(
            height == skip_height && width == skip_width,
            "skip feature map is {skip_height}x{skip_width}, expected {height}x{width} to match the upsampled map"
        );

        let x = Tensor::cat(vec![x, skip_features], 1);

        self.conv_block.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    input_channels: usize,
    num_filters: usize,
}

impl DecoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        self.assertions();
        DecoderBlock {
            conv_transpose: ConvTranspose2dConfig::new(
                [self.input_channels, self.input_channels / 2],
                [2, 2],
            )
            .with_stride([2, 2])
            .init(device),
            conv_block: ConvBlockConfig::new(self.input_channels, self.num_filters).init(device),
        }
    }

    fn assertions(&self) {
        assert!(
            self.input_channels % 2 == 0,
            "Decoder input channels must be even, the upsample halves them. Got {}",
            self.input_channels
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn conv_block_preserves_spatial_size() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ConvBlock<B> = ConvBlockConfig::new(3, 8).init(&device);
        let input = Tensor::ones([2, 3, 16, 16], &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [2, 8, 16, 16]);
    }

    #[test]
    fn encoder_block_halves_spatial_size() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: EncoderBlock<B> = EncoderBlockConfig::new(ConvBlockConfig::new(1, 4))
            .init(&device);
        let input = Tensor::ones([2, 1, 16, 16], &device);
        let (skip_features, pooled) = block.forward(input);

        assert_eq!(skip_features.dims(), [2, 4, 16, 16]);
        assert_eq!(pooled.dims(), [2, 4, 8, 8]);
    }

    #[test]
    fn decoder_block_fuses_skip_features() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: DecoderBlock<B> = DecoderBlockConfig::new(16, 8).init(&device);
        let input = Tensor::ones([2, 16, 8, 8], &device);
        let skip_features = Tensor::ones([2, 8, 16, 16], &device);
        let output = block.forward(input, skip_features);

        assert_eq!(output.dims(), [2, 8, 16, 16]);
    }

    #[test]
    #[should_panic(expected = "Decoder input channels must be even")]
    fn decoder_block_rejects_odd_input_channels() {
        type B = NdArray<f32>;
        let device = Default::default();

        let _block: DecoderBlock<B> = DecoderBlockConfig::new(7, 3).init(&device);
    }

    #[test]
    #[should_panic(expected = "expected 16x16 to match the upsampled map")]
    fn decoder_block_rejects_mismatched_skip_size() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: DecoderBlock<B> = DecoderBlockConfig::new(16, 8).init(&device);
        let input = Tensor::ones([2, 16, 8, 8], &device);
        let skip_features = Tensor::ones([2, 8, 12, 12], &device);
        let _ = block.forward(input, skip_features);
    }
}
