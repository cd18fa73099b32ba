fn main() {
    emote_cli::run_main();
}
