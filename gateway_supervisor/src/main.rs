//! Binary entry point: run the supervisor and propagate its exit code.

#[ tokio::main ]
async fn main()
{
  let code = gateway_supervisor::run().await;
  std::process::exit( code );
}
