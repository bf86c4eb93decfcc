//! Serializers for [`LaunchDescriptor`]: a POSIX `sh` launch script or
//! pretty-printed JSON. Output depends only on the descriptor.

use crate::compose::LaunchDescriptor;
use crate::models::OutputFormat;

/// Render `descriptor` in `format`
pub fn render(descriptor: &LaunchDescriptor, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Sh => Ok(to_shell_script(descriptor)),
        OutputFormat::Json => to_json(descriptor),
    }
}

pub fn to_shell_script(descriptor: &LaunchDescriptor) -> String {
    let mut script = String::from("#!/bin/sh\n# Generated by wineport, regenerate with `wineport compose`\n\n");

    for var in descriptor.env.iter() {
        script.push_str(&format!("export {}={}\n", var.name, shell_quote(&var.value)));
    }
    script.push('\n');

    script.push_str(&format!(
        "cd {} || exit 1\n",
        shell_quote(&descriptor.working_dir.to_string_lossy())
    ));

    for command in &descriptor.pre_launch {
        script.push_str(&join_argv(command.argv.iter().map(String::as_str)));
        if command.background {
            script.push_str(" &");
        }
        script.push('\n');
    }

    let target = descriptor.target.to_string_lossy();
    let invocation = descriptor
        .runner
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(target.as_ref()));
    script.push_str(&format!("exec {} \"$@\"\n", join_argv(invocation)));

    script
}

pub fn to_json(descriptor: &LaunchDescriptor) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(descriptor)?;
    json.push('\n');
    Ok(json)
}

fn join_argv<'a>(argv: impl Iterator<Item = &'a str>) -> String {
    argv.map(shell_quote).collect::<Vec<_>>().join(" ")
}

/// Quote for POSIX sh; words made of safe characters are left bare
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | ',' | '=' | '+'));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{AuxCommand, EnvBlock};
    use std::path::PathBuf;

    fn descriptor() -> LaunchDescriptor {
        let mut env = EnvBlock::new();
        env.push("WINEPREFIX", "/home/me/Games/My Game/prefix").unwrap();
        env.push("WINEDEBUG", "-all").unwrap();
        env.push("WINEDLLOVERRIDES", "d3d9,d3d10core,d3d11,dxgi=n,b").unwrap();
        LaunchDescriptor {
            target: PathBuf::from("/home/me/Games/My Game/game/It's.exe"),
            env,
            runner: vec!["wine".to_string()],
            pre_launch: vec![
                AuxCommand {
                    argv: vec!["winetricks".into(), "-q".into(), "sound=pulse".into()],
                    background: false,
                },
                AuxCommand {
                    argv: vec!["gptokeyb".into(), "-c".into(), "/c/controls.gptk".into()],
                    background: true,
                },
            ],
            working_dir: PathBuf::from("/home/me/Games/My Game/game"),
        }
    }

    #[test]
    fn test_shell_script_layout() {
        let script = to_shell_script(&descriptor());
        let expected = "#!/bin/sh
# Generated by wineport, regenerate with `wineport compose`

export WINEPREFIX='/home/me/Games/My Game/prefix'
export WINEDEBUG=-all
export WINEDLLOVERRIDES=d3d9,d3d10core,d3d11,dxgi=n,b

cd '/home/me/Games/My Game/game' || exit 1
winetricks -q sound=pulse
gptokeyb -c /c/controls.gptk &
exec wine '/home/me/Games/My Game/game/It'\\''s.exe' \"$@\"
";
        assert_eq!(script, expected);
    }

    #[test]
    fn test_serialization_is_reproducible() {
        let d = descriptor();
        assert_eq!(to_shell_script(&d), to_shell_script(&d.clone()));
        assert_eq!(to_json(&d).unwrap(), to_json(&d.clone()).unwrap());
    }

    #[test]
    fn test_json_keeps_env_order() {
        let json = to_json(&descriptor()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let names: Vec<&str> = value["env"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["WINEPREFIX", "WINEDEBUG", "WINEDLLOVERRIDES"]);
        assert_eq!(value["pre_launch"][1]["background"], true);
        assert_eq!(value["runner"][0], "wine");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain/path-1.0"), "plain/path-1.0");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
