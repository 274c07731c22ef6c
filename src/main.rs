fn main() -> Result<(), Box<dyn std::error::Error>> {
    chatdesk::cli::main()
}
