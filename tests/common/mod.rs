use assert_cmd::Command;

pub fn schedbot_bin() -> Command {
    #[allow(deprecated)]
    {
        Command::cargo_bin("schedbot").expect("schedbot test binary should build")
    }
}
