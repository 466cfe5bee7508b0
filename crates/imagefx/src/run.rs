use std::path::Path;

use anyhow::{bail, Context, Result};
use compositor::{
    Compositor, CompositorOptions, FrameOutcome, GpuContext, PreviewSurface, ProgramCache,
    ToolRegistry,
};
use image::RgbaImage;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Step};
use crate::config::{FileConfig, Settings};

/// The tool left selected once every step has been applied.
const RESTING_TOOL: &str = "preview";

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let file = FileConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let settings = Settings::resolve(&args, &file).context("invalid configuration")?;
    tracing::debug!(?settings, "resolved settings");

    if args.list_tools {
        let ctx = acquire_context(&settings)?;
        let mut cache = ProgramCache::new();
        print_tools(&ToolRegistry::with_builtin(&ctx, &mut cache));
        return Ok(());
    }

    let (Some(input), Some(output)) = (args.input.as_deref(), args.output.as_deref()) else {
        bail!("an input image and --output are required");
    };
    let image = load_input(input)?;

    let ctx = acquire_context(&settings)?;
    let mut compositor = Compositor::new(ctx, CompositorOptions::default());
    compositor
        .load_image(&image)
        .with_context(|| format!("failed to upload {}", input.display()))?;

    let mut cache = ProgramCache::new();
    let registry = ToolRegistry::with_builtin(compositor.context(), &mut cache);
    for step in &args.steps {
        apply_step(&mut compositor, &registry, step)?;
    }

    let resting = registry
        .find(RESTING_TOOL)
        .context("passthrough tool unavailable")?;
    compositor.set_provider(resting.provider());

    let result = compositor
        .snapshot()
        .context("failed to read back the edited image")?;
    save_png(&result, output)?;
    tracing::info!(path = %output.display(), steps = args.steps.len(), "wrote edited image");

    if let Some(path) = args.preview.as_deref() {
        let (width, height) = settings.preview_size.unwrap_or_else(|| image.dimensions());
        let mut preview = PreviewSurface::new(compositor.context(), width, height, settings.preview)
            .context("failed to build preview shader")?;
        preview.render(&compositor);
        let tiles = preview
            .snapshot(compositor.context())
            .context("failed to read back the preview")?;
        save_png(&tiles, path)?;
        tracing::info!(path = %path.display(), width, height, "wrote preview");
    }

    Ok(())
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn acquire_context(settings: &Settings) -> Result<GpuContext> {
    let ctx = GpuContext::new(&settings.context_options()).context("failed to initialise GPU")?;
    let adapter = ctx.adapter();
    if adapter.is_software() {
        tracing::warn!(adapter = %adapter.name, "running on a software adapter");
    }
    Ok(ctx)
}

fn load_input(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to read image {}", path.display()))?
        .to_rgba8();
    tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "decoded input");
    Ok(image)
}

fn apply_step(compositor: &mut Compositor, registry: &ToolRegistry, step: &Step) -> Result<()> {
    let registered = registry.find(&step.tool)?;
    let tool = registered.tool();
    tool.reset();
    for (name, value) in &step.params {
        let stored = tool
            .set_parameter(name, *value)
            .with_context(|| format!("step '{}'", step.tool))?;
        if stored != *value {
            tracing::warn!(tool = tool.info().name, parameter = %name, requested = value, stored, "value clamped");
        }
    }

    match compositor.set_provider(registered.provider()) {
        FrameOutcome::Rendered(report) => {
            tracing::info!(tool = tool.info().name, passes = report.draw_count(), "rendered step");
        }
        outcome => bail!("tool '{}' did not render: {outcome:?}", tool.info().name),
    }
    compositor
        .apply()
        .with_context(|| format!("failed to apply '{}'", tool.info().name))?;
    Ok(())
}

fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn print_tools(registry: &ToolRegistry) {
    for registered in registry.tools() {
        let info = registered.info();
        println!("{}  {}", info.name, info.description);
        if !info.aliases.is_empty() {
            println!("    aliases: {}", info.aliases.join(", "));
        }
        for spec in registered.tool().parameters() {
            println!(
                "    {:<14} {} ..= {} (default {})",
                spec.name, spec.min, spec.max, spec.default
            );
        }
    }
    for failure in registry.failures() {
        println!("{}  unavailable: {}", failure.info.name, failure.error);
    }
}
