//! Config command handler

use sonda::HarnessConfig;

use crate::commands::ConfigArgs;
use crate::config::resolve_harness;
use crate::error::CliResult;

/// YAML for the effective harness configuration
pub fn render_config(harness: &HarnessConfig) -> CliResult<String> {
    Ok(harness.to_yaml()?)
}

/// Execute the config command
pub fn execute_config(args: &ConfigArgs) -> CliResult<()> {
    let harness = resolve_harness(&args.harness)?;
    print!("{}", render_config(&harness)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_config_parses_back() {
        let harness = HarnessConfig::new()
            .with_url("http://localhost:8100")
            .with_headless(false);
        let yaml = render_config(&harness).unwrap();

        assert!(yaml.contains("hook_object: behat"));
        assert_eq!(HarnessConfig::from_yaml(&yaml).unwrap(), harness);
    }
}
