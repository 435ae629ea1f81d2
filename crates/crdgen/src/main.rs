use dataplane::api::v1::agent::CBContainersAgent;
use kube::CustomResourceExt as _;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&CBContainersAgent::crd())?);
    Ok(())
}
