//! Argument parsing and job files for the worker binary.

use std::path::PathBuf;

use kvgen_core::templates::flux_lora::FluxLoraRequest;
use serde::Deserialize;

pub const USAGE: &str = "\
usage:
  kvgen-worker flux-lora [params.json]   generate images, persisting them when storage is configured
  kvgen-worker prompt <image>            print a caption for an image";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    FluxLora { params: Option<PathBuf> },
    Prompt { image: PathBuf },
}

impl Command {
    /// Parse the arguments after the program name.
    pub fn parse<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let command = match args.next().as_deref() {
            Some("flux-lora") => Command::FluxLora {
                params: args.next().map(PathBuf::from),
            },
            Some("prompt") => Command::Prompt {
                image: args
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| "prompt needs an image path".to_string())?,
            },
            Some(other) => return Err(format!("unknown command '{other}'")),
            None => return Err("missing command".to_string()),
        };

        match args.next() {
            Some(extra) => Err(format!("unexpected argument '{extra}'")),
            None => Ok(command),
        }
    }
}

const DEFAULT_POSITIVE: &str = "Create a vibrant and engaging advertisement for a premium bottled \
coffee, with a warm, inviting atmosphere. In the foreground, feature a close-up of a sleek, elegant \
bottle of coffee, highlighting its rich, dark color and smooth texture. The bottle should be slightly \
tilted, with a gentle pour of coffee into a glass cup, emphasizing its freshness and premium quality. \
The background should depict a picturesque landscape with mountains and a clear blue sky, with hot \
air balloons floating in the distance. The bottle of coffee should be prominently displayed, with the \
tagline 'Expertly Crafted with Care' clearly visible. The color palette should be warm and inviting, \
with a mix of earthy tones and bright accents.";

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    1024
}

fn default_batch_size() -> u32 {
    1
}

fn default_lora() -> String {
    "NCMocha.safetensors".to_string()
}

fn default_positive() -> String {
    DEFAULT_POSITIVE.to_string()
}

fn default_negative() -> String {
    "bad hands, bad anatomy, blurry, low quality, distorted".to_string()
}

fn default_style() -> String {
    "Life Style".to_string()
}

fn default_product() -> String {
    "Nescafe Gold".to_string()
}

/// A flux-lora run read from a JSON file. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FluxLoraJob {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_lora")]
    pub lora_name: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default = "default_positive")]
    pub positive_prompt: String,
    #[serde(default = "default_negative")]
    pub negative_prompt: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_product")]
    pub product: String,
}

impl Default for FluxLoraJob {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            batch_size: default_batch_size(),
            lora_name: default_lora(),
            model_name: None,
            positive_prompt: default_positive(),
            negative_prompt: default_negative(),
            seed: None,
            style: default_style(),
            product: default_product(),
        }
    }
}

impl FluxLoraJob {
    pub fn request(&self) -> FluxLoraRequest {
        FluxLoraRequest {
            width: self.width,
            height: self.height,
            lora_name: self.lora_name.clone(),
            model_name: self.model_name.clone(),
            positive_prompt: self.positive_prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            batch_size: self.batch_size,
            seed: self.seed,
        }
    }
}
