use ccdred_core::catalog::ObservationCatalog;
use ccdred_core::engine::Rejection;
use ccdred_core::frame::FrameType;
use ccdred_core::pipeline::{ReductionConfig, ReductionReport};
use ccdred_core::store::Organized;
use console::Style;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    warning: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            warning: Style::new().yellow().bold(),
        }
    }
}

fn print_title(s: &Styles, title: &str) {
    println!();
    println!("  {}", s.title.apply_to(title));
    println!(
        "  {}",
        s.title.apply_to("\u{2550}".repeat(title.chars().count()))
    );
    println!();
}

pub fn print_reduction_summary(config: &ReductionConfig, engine_name: &str) {
    let s = Styles::new();
    print_title(&s, "CCD Night Reduction");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Directory"),
        s.path.apply_to(config.working_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Engine"),
        s.method.apply_to(engine_name)
    );
    println!();

    println!("  {}", s.header.apply_to("Calibration"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Trim"),
        s.value.apply_to(config.trim)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Linearity"),
        s.value.apply_to(config.linearity)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Flat level"),
        s.value.apply_to(config.normalization)
    );
    println!();

    println!("  {}", s.header.apply_to("Combine"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(config.combine.method)
    );
    match config.combine.reject {
        Rejection::None => println!(
            "    {:<12}{}",
            s.label.apply_to("Reject"),
            s.disabled.apply_to("none")
        ),
        Rejection::MinMax => println!(
            "    {:<12}{}",
            s.label.apply_to("Reject"),
            s.value.apply_to(format!(
                "minmax (low {}, high {})",
                config.combine.nlow, config.combine.nhigh
            ))
        ),
    }
    println!();

    if !config.display {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Previews"),
            s.disabled.apply_to("disabled")
        );
    }
    if config.debug {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Debug"),
            s.warning.apply_to("working lists kept")
        );
    }
}

/// What the organize step did, shown before asking to proceed.
pub fn print_organized(organized: &Organized) {
    let s = Styles::new();
    println!();
    println!("  {}", s.header.apply_to("Frames organized"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Copied"),
        s.value.apply_to(organized.copied)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bias"),
        s.path.apply_to(organized.bias_dir().display())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Dark"),
        s.path.apply_to(organized.dark_dir().display())
    );
    let filters: Vec<&str> = organized.filters().iter().map(|f| f.as_str()).collect();
    println!(
        "    {:<12}{}",
        s.label.apply_to("Filters"),
        s.value.apply_to(filters.join(", "))
    );
    println!();
}

pub fn print_report(report: &ReductionReport) {
    let s = Styles::new();
    print_title(&s, "Reduction Report");

    println!("  {}", s.header.apply_to("Master frames"));
    if let Some(ref bias) = report.master_bias {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Bias"),
            s.path.apply_to(bias.display())
        );
    }
    for dark in &report.master_darks {
        println!(
            "    {:<12}{} {}",
            s.label.apply_to(format!("Dark {}s", dark.exposure_time)),
            s.path.apply_to(dark.path.display()),
            s.label.apply_to(format!("({} frames)", dark.frames))
        );
    }
    for flat in &report.master_flats {
        println!(
            "    {:<12}{}",
            s.label.apply_to(format!("Flat {}", flat.filter)),
            s.path.apply_to(flat.path.display())
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Calibrated objects"));
    for filter in &report.filters {
        let frames: Vec<_> = report.calibrated_in(filter).collect();
        if frames.is_empty() {
            println!(
                "    {:<12}{}",
                s.label.apply_to(filter),
                s.disabled.apply_to("none")
            );
            continue;
        }
        let dark_corrected = frames.iter().filter(|f| f.dark_subtracted).count();
        println!(
            "    {:<12}{}",
            s.label.apply_to(filter),
            s.value.apply_to(format!(
                "{} frames ({} dark-subtracted)",
                frames.len(),
                dark_corrected
            ))
        );
    }
    println!();

    if !report.warnings.is_empty() {
        println!("  {}", s.warning.apply_to("Warnings"));
        for warning in &report.warnings {
            println!("    {}", s.warning.apply_to(warning));
        }
        println!();
    }
}

pub fn print_catalog(catalog: &ObservationCatalog) {
    let s = Styles::new();
    print_title(&s, "Observation Catalog");

    println!(
        "  {:<20}{:<16}{:<8}{:<8}{:>10}{:>9}",
        s.header.apply_to("Name"),
        s.header.apply_to("Object"),
        s.header.apply_to("Type"),
        s.header.apply_to("Filter"),
        s.header.apply_to("Exptime"),
        s.header.apply_to("Airmass"),
    );
    for record in catalog.records() {
        let filter = record
            .filter
            .as_ref()
            .map(|f| f.as_str().to_string())
            .unwrap_or_else(|| "-".into());
        let airmass = record
            .airmass
            .map(|a| format!("{a:.3}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<20}{:<16}{:<8}{:<8}{:>10}{:>9}",
            s.value.apply_to(&record.name),
            record.object,
            s.method.apply_to(record.frame_type),
            filter,
            record.exposure_time.to_string(),
            airmass,
        );
    }
    println!();

    let filters: Vec<String> = catalog.filters().iter().map(|f| f.to_string()).collect();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Filters"),
        s.value.apply_to(filters.join(", "))
    );
    let darks: Vec<String> = catalog
        .exposure_groups(FrameType::Dark)
        .iter()
        .map(|g| format!("{}s x{}", g.exposure_time, g.names.len()))
        .collect();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Dark groups"),
        s.value.apply_to(darks.join(", "))
    );
    println!();
}
