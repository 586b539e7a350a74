fn main() -> Result<(), Box<dyn std::error::Error>> {
    vibecode::cli::main()
}
