//! `clap`-derived CLI options, converted into `compiler_core::CompilerOptions`.

use clap::Args;
use compiler_core::context::{CompilerOptions, PropertyCollapseLevel};
use compiler_core::feature_set::{Feature, FeatureSet};

/// Compiler-facing options shared between the `optic` binary and its
/// test harness (spec §6 "Compiler options").
#[derive(Args, Debug, Clone, Default)]
pub struct CompileOptions {
    /// Source features the input is allowed to use (comma-separated):
    /// arrow-functions, classes, destructuring, let-const,
    /// template-strings, async-await, generators, optional-chaining,
    /// nullish-coalescing, string-continuation, trailing-commas-in-lists.
    #[arg(long = "language-in", value_delimiter = ',')]
    pub language_in: Vec<String>,

    /// Source features the output must be restricted to. Defaults to
    /// `language-in` when omitted.
    #[arg(long = "language-out", value_delimiter = ',')]
    pub language_out: Vec<String>,

    /// Qualified-name collapse level: none | module-export-only | all.
    #[arg(long = "property-collapse-level", default_value = "none")]
    pub property_collapse_level: String,

    /// Emit a source map alongside the optimized AST.
    #[arg(long = "generate-source-map", default_value_t = false)]
    pub generate_source_map: bool,

    /// Keep collapsed/devirtualized names verbatim (for readable test
    /// fixtures) instead of minifying them.
    #[arg(long = "accept-pseudo-names", default_value_t = false)]
    pub accept_pseudo_names: bool,

    /// Fixed-point iteration cap for loopable pass groups.
    #[arg(long = "max-fixed-point-iterations", default_value_t = 1000)]
    pub max_fixed_point_iterations: usize,
}

impl CompileOptions {
    pub fn to_compiler_options(&self) -> Result<CompilerOptions, String> {
        let language_in = parse_feature_list(&self.language_in)?;
        let language_out = if self.language_out.is_empty() {
            language_in.clone()
        } else {
            parse_feature_list(&self.language_out)?
        };
        let property_collapse_level = match self.property_collapse_level.as_str() {
            "none" => PropertyCollapseLevel::None,
            "module-export-only" => PropertyCollapseLevel::ModuleExportOnly,
            "all" => PropertyCollapseLevel::All,
            other => return Err(format!("unknown --property-collapse-level '{other}'")),
        };
        Ok(CompilerOptions {
            language_in,
            language_out,
            property_collapse_level,
            generate_source_map: self.generate_source_map,
            accept_pseudo_names: self.accept_pseudo_names,
            max_fixed_point_iterations: self.max_fixed_point_iterations,
            ..Default::default()
        })
    }
}

fn parse_feature_list(values: &[String]) -> Result<FeatureSet, String> {
    let mut set = FeatureSet::empty();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        let feature: Feature = trimmed
            .parse()
            .map_err(|_| format!("unknown feature '{trimmed}'"))?;
        set.insert(feature);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_language_out_defaults_to_language_in() {
        let opts = CompileOptions {
            language_in: vec!["classes".into(), "async-await".into()],
            ..Default::default()
        };
        let compiled = opts.to_compiler_options().unwrap();
        assert_eq!(compiled.language_in, compiled.language_out);
        assert!(compiled.language_in.contains(Feature::Classes));
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let opts = CompileOptions {
            language_in: vec!["not-a-feature".into()],
            ..Default::default()
        };
        assert!(opts.to_compiler_options().is_err());
    }

    #[test]
    fn unknown_collapse_level_is_rejected() {
        let opts = CompileOptions {
            property_collapse_level: "bogus".into(),
            ..Default::default()
        };
        assert!(opts.to_compiler_options().is_err());
    }
}
