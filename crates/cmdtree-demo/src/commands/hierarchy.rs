//! A group whose initializer sets state its subcommands read.

use cmdtree::{Callback, CommandClass, DefinitionError, Param, TyperCommand};

/// Decimal places set by `math --precision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision(pub usize);

fn precision(cmd: &TyperCommand) -> usize {
    cmd.state::<Precision>().map_or(2, |p| p.0)
}

pub fn class() -> Result<CommandClass, DefinitionError> {
    CommandClass::define("hierarchy")
        .help("Test a hierarchy of commands.")
        .group(
            Callback::method("math", |cmd, args| {
                cmd.set_state(Precision(args.get("precision")?));
                Ok::<_, anyhow::Error>(())
            })
            .doc("Do some math at the given precision.")
            .param(
                Param::option("precision")
                    .int()
                    .default(2)
                    .help("The number of decimal places to output."),
            ),
        )
        .command_in(
            "math",
            Callback::method("multiply", |cmd, args| {
                let numbers: Vec<f64> = args.get("numbers")?;
                Ok::<_, anyhow::Error>(format!(
                    "{:.*}",
                    precision(cmd),
                    numbers.iter().product::<f64>()
                ))
            })
            .doc("Multiply the given numbers.")
            .param(Param::argument("numbers").float().multiple()),
        )
        .command_in(
            "math",
            Callback::method("divide", |cmd, args| -> anyhow::Result<String> {
                let numerator: f64 = args.get("numerator")?;
                let denominator: f64 = args.get("denominator")?;
                let floor: bool = args.get("floor")?;
                if denominator == 0.0 {
                    anyhow::bail!("cannot divide by zero");
                }
                let quotient = numerator / denominator;
                let quotient = if floor { quotient.floor() } else { quotient };
                Ok(format!("{:.*}", precision(cmd), quotient))
            })
            .doc("Divide the numerator by the denominator.")
            .params([
                Param::argument("numerator").float(),
                Param::argument("denominator").float(),
                Param::flag("floor").help("Use floor division."),
            ]),
        )
        .build()
}
