fn main() -> anyhow::Result<()> {
    studylink_lib::run()
}
