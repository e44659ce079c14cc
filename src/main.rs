fn main() -> std::process::ExitCode {
  reflow_host_lib::run()
}
