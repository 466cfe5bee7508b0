use std::path::PathBuf;

use clap::Parser;
use compositor::{PowerPreference, PreviewVisibility, SamplerFilter};

#[derive(Parser, Debug)]
#[command(
    name = "imagefx",
    author,
    version,
    about = "Replay image editor tool chains on the GPU compositor"
)]
pub struct Cli {
    /// Image to edit (PNG, JPEG, BMP or GIF).
    #[arg(value_name = "INPUT", required_unless_present = "list_tools")]
    pub input: Option<PathBuf>,

    /// Tool step, applied in order (e.g. `blur:sigma=8` or `transform:rotation=90,flip_x=1`).
    #[arg(long = "step", value_name = "TOOL[:NAME=VALUE,...]", value_parser = parse_step)]
    pub steps: Vec<Step>,

    /// Where to write the edited image.
    #[arg(short, long, value_name = "PATH", required_unless_present = "list_tools")]
    pub output: Option<PathBuf>,

    /// Also render the tiled background preview to this PNG.
    #[arg(long, value_name = "PATH")]
    pub preview: Option<PathBuf>,

    /// Preview resolution (e.g. `1920x1080`); defaults to the image size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub preview_size: Option<(u32, u32)>,

    /// Number of preview tiles across and down.
    #[arg(long, value_name = "N")]
    pub tiles: Option<f32>,

    /// Preview visibility: `shown`, `faded`, or `hidden`.
    #[arg(long, value_name = "STATE", value_parser = parse_preview_state)]
    pub preview_state: Option<PreviewVisibility>,

    /// Texture sampling used by every pass: `linear` or `nearest`.
    #[arg(long, value_name = "FILTER", value_parser = parse_filter)]
    pub filter: Option<SamplerFilter>,

    /// Adapter preference: `low` or `high`.
    #[arg(long, value_name = "POWER", value_parser = parse_power)]
    pub power: Option<PowerPreference>,

    /// Configuration file; defaults to `config.toml` in the user config directory.
    #[arg(long, value_name = "PATH", env = "IMAGEFX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the available tools and their parameters, then exit.
    #[arg(long)]
    pub list_tools: bool,
}

/// One tool selection with the parameter values to set before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub tool: String,
    pub params: Vec<(String, f32)>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_step(value: &str) -> Result<Step, String> {
    let (tool, params) = match value.split_once(':') {
        Some((tool, params)) => (tool.trim(), params),
        None => (value.trim(), ""),
    };
    if tool.is_empty() {
        return Err("step must name a tool".to_string());
    }

    let params = params
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected NAME=VALUE, got '{pair}'"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("parameter name missing in '{pair}'"));
            }
            let value = parse_param_value(raw.trim())
                .ok_or_else(|| format!("invalid value '{}' for parameter '{name}'", raw.trim()))?;
            Ok((name.to_string(), value))
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(Step {
        tool: tool.to_string(),
        params,
    })
}

fn parse_param_value(raw: &str) -> Option<f32> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => Some(1.0),
        "false" | "off" | "no" => Some(0.0),
        other => other.parse().ok().filter(|value: &f32| value.is_finite()),
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}', expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{value}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{value}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size '{value}' must be non-zero"));
    }
    Ok((width, height))
}

pub fn parse_filter(value: &str) -> Result<SamplerFilter, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "linear" | "bilinear" => Ok(SamplerFilter::Linear),
        "nearest" | "point" => Ok(SamplerFilter::Nearest),
        other => Err(format!("unknown filter '{other}'; expected linear or nearest")),
    }
}

pub fn parse_power(value: &str) -> Result<PowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" => Ok(PowerPreference::Low),
        "high" | "high-performance" => Ok(PowerPreference::High),
        other => Err(format!("unknown power preference '{other}'; expected low or high")),
    }
}

pub fn parse_preview_state(value: &str) -> Result<PreviewVisibility, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_without_parameters() {
        let step = parse_step("invert").unwrap();
        assert_eq!(step.tool, "invert");
        assert!(step.params.is_empty());
    }

    #[test]
    fn step_with_parameters() {
        let step = parse_step("transform: rotation=90, flip_x=true ,offset_y=-0.25").unwrap();
        assert_eq!(step.tool, "transform");
        assert_eq!(
            step.params,
            vec![
                ("rotation".to_string(), 90.0),
                ("flip_x".to_string(), 1.0),
                ("offset_y".to_string(), -0.25),
            ]
        );
    }

    #[test]
    fn malformed_steps_are_rejected() {
        assert!(parse_step("").is_err());
        assert!(parse_step(":sigma=2").is_err());
        assert!(parse_step("blur:sigma").is_err());
        assert!(parse_step("blur:=2").is_err());
        assert!(parse_step("blur:sigma=wide").is_err());
        assert!(parse_step("blur:sigma=inf").is_err());
    }

    #[test]
    fn sizes_parse_either_case() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size(" 64X32 "), Ok((64, 32)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn filter_and_power_words() {
        assert_eq!(parse_filter("Nearest"), Ok(SamplerFilter::Nearest));
        assert_eq!(parse_filter("linear"), Ok(SamplerFilter::Linear));
        assert!(parse_filter("cubic").is_err());
        assert_eq!(parse_power("high-performance"), Ok(PowerPreference::High));
        assert!(parse_power("medium").is_err());
    }

    #[test]
    fn full_command_line() {
        let cli = Cli::try_parse_from([
            "imagefx",
            "photo.png",
            "--step",
            "levels:grey=0.4",
            "--step",
            "blur",
            "-o",
            "out.png",
            "--preview-size",
            "320x200",
            "--preview-state",
            "shown",
        ])
        .unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("photo.png")));
        assert_eq!(cli.steps.len(), 2);
        assert_eq!(cli.steps[1].tool, "blur");
        assert_eq!(cli.output, Some(PathBuf::from("out.png")));
        assert_eq!(cli.preview_size, Some((320, 200)));
        assert_eq!(cli.preview_state, Some(PreviewVisibility::Shown));
        assert_eq!(cli.filter, None);
    }

    #[test]
    fn list_tools_needs_no_input() {
        let cli = Cli::try_parse_from(["imagefx", "--list-tools"]).unwrap();
        assert!(cli.list_tools);
        assert!(Cli::try_parse_from(["imagefx", "photo.png"]).is_err());
    }
}
