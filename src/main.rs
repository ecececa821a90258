fn main() -> anyhow::Result<()> {
    wire_ngin::flow::run()
}
