use std::path::Path;

/// Launcher options whose value is the following argument.
const OPTIONS_WITH_VALUE: &[&str] = &[
    "-cp",
    "-classpath",
    "--class-path",
    "-p",
    "--module-path",
    "--upgrade-module-path",
    "--add-modules",
    "--limit-modules",
    "--add-reads",
    "--add-exports",
    "--add-opens",
    "--patch-module",
];

pub fn is_java_launcher(program: &str) -> bool {
    let name = Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program);
    name == "java" || name == "java.exe" || name == "javaw.exe"
}

/// Rebuilds the JVM "java command" from a launcher argv: the main class, jar or
/// module followed by the program arguments, with launcher options dropped.
///
/// Returns `None` when `argv` is not a java launcher invocation or names no entry point.
pub fn java_command(argv: &[String]) -> Option<String> {
    let (program, rest) = argv.split_first()?;
    if !is_java_launcher(program) {
        return None;
    }

    let mut args = rest.iter();
    while let Some(arg) = args.next() {
        let entry = match arg.as_str() {
            "-jar" | "-m" | "--module" => args.next()?.clone(),
            a if a.starts_with("--module=") => a["--module=".len()..].to_string(),
            a if OPTIONS_WITH_VALUE.contains(&a) => {
                args.next()?;
                continue;
            }
            a if a.starts_with('-') => continue,
            a => a.to_string(),
        };

        let command = std::iter::once(entry)
            .chain(args.cloned())
            .collect::<Vec<_>>()
            .join(" ");
        return Some(command);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn argv(cmd: &str) -> Vec<String> {
        cmd.split_whitespace().map(String::from).collect()
    }

    #[rstest]
    #[case(
        "/usr/bin/java -Xmx512m -cp /opt/zk/lib/* -Dzookeeper.log.dir=/var/log org.apache.zookeeper.server.quorum.QuorumPeerMain /etc/zk/zoo.cfg",
        Some("org.apache.zookeeper.server.quorum.QuorumPeerMain /etc/zk/zoo.cfg")
    )]
    #[case("java -jar app.jar --port 9000", Some("app.jar --port 9000"))]
    #[case("java --module-path mods -m com.example/com.example.Main", Some("com.example/com.example.Main"))]
    #[case("java --module=com.example/com.example.Main arg", Some("com.example/com.example.Main arg"))]
    #[case("java -version", None)]
    #[case("java -cp", None)]
    #[case("/usr/bin/python3 -m http.server", None)]
    fn test_java_command(#[case] cmd: &str, #[case] expected: Option<&str>) {
        assert_eq!(java_command(&argv(cmd)).as_deref(), expected);
    }

    #[test]
    fn test_empty_argv() {
        assert_eq!(java_command(&[]), None);
    }

    #[rstest]
    #[case("java", true)]
    #[case("/usr/lib/jvm/java-17/bin/java", true)]
    #[case("javac", false)]
    #[case("/usr/bin/javascript", false)]
    fn test_is_java_launcher(#[case] program: &str, #[case] expected: bool) {
        assert_eq!(is_java_launcher(program), expected);
    }
}
