fn main() {
    if let Err(err) = iongraph_rs_renderer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
