//! Tests for DeleteResources validation and execution against the in-memory
//! compute backend.

use std::sync::Arc;
use std::time::Duration;

use imagesmith_compute::{ComputeError, InMemoryCompute, Operation, ResourceKind};
use imagesmith_workflow::{
  DeleteResources, DeletionRegistry, StepContext, StepError, ValidationContext, ValidationError,
  resolve_name,
};

const WORKFLOW: &str = "wf";
const SUFFIX: &str = "abcde";

fn resolved(name: &str) -> String {
  resolve_name(name, WORKFLOW, SUFFIX)
}

fn compute_with(instances: &[&str], disks: &[&str]) -> Arc<InMemoryCompute> {
  let compute = Arc::new(InMemoryCompute::new());
  for i in instances {
    compute.add_instance(resolved(i));
  }
  for d in disks {
    compute.add_disk(resolved(d));
  }
  compute
}

fn context(compute: Arc<InMemoryCompute>) -> StepContext {
  StepContext::new(WORKFLOW, SUFFIX, "my-project", "us-central1-a", compute)
}

fn step(instances: &[&str], disks: &[&str], images: &[&str]) -> DeleteResources {
  DeleteResources {
    instances: instances.iter().map(|s| s.to_string()).collect(),
    disks: disks.iter().map(|s| s.to_string()).collect(),
    images: images.iter().map(|s| s.to_string()).collect(),
  }
}

fn validation<'a>(
  step: &'a str,
  ctx: &'a StepContext,
  registry: &'a DeletionRegistry,
) -> ValidationContext<'a> {
  ValidationContext {
    step,
    context: ctx,
    registry,
  }
}

// --- validation ---

#[tokio::test]
async fn test_validate_claims_exactly_the_batch() {
  let compute = compute_with(&["a", "b"], &["d1", "d2"]);
  let ctx = context(compute);
  let registry = DeletionRegistry::new();
  let step = step(&["a", "b"], &["d1", "d2"], &["projects/p/global/images/img"]);

  step
    .validate(&validation("cleanup", &ctx, &registry))
    .await
    .unwrap();

  assert_eq!(registry.instances().len(), 2);
  assert_eq!(registry.disks().len(), 2);
  assert_eq!(
    registry.instances().owner(&resolved("a")).as_deref(),
    Some("cleanup")
  );
  assert!(registry.disks().contains(&resolved("d2")));
  assert!(!registry.instances().contains("projects/p/global/images/img"));
}

#[tokio::test]
async fn test_validate_missing_disk() {
  let compute = compute_with(&["a"], &[]);
  let ctx = context(compute);
  let registry = DeletionRegistry::new();

  let err = step(&["a"], &["d1"], &[])
    .validate(&validation("cleanup", &ctx, &registry))
    .await
    .unwrap_err();

  assert_eq!(
    err,
    ValidationError::ResourceNotFound {
      action: "delete disk",
      kind: ResourceKind::Disk,
      name: "d1".to_string(),
    }
  );
  // Disks are checked first, so the instance was never claimed.
  assert!(registry.instances().is_empty());
}

#[tokio::test]
async fn test_validate_missing_instance_keeps_earlier_claims() {
  let compute = compute_with(&[], &["d1"]);
  let ctx = context(compute);
  let registry = DeletionRegistry::new();

  let err = step(&["a"], &["d1"], &[])
    .validate(&validation("cleanup", &ctx, &registry))
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    ValidationError::ResourceNotFound { kind: ResourceKind::Instance, .. }
  ));
  assert_eq!(
    registry.disks().owner(&resolved("d1")).as_deref(),
    Some("cleanup")
  );
}

#[tokio::test]
async fn test_validate_duplicate_schedule_across_steps() {
  let compute = compute_with(&["a"], &["d1"]);
  let ctx = context(compute);
  let registry = DeletionRegistry::new();

  step(&["a"], &[], &[])
    .validate(&validation("first", &ctx, &registry))
    .await
    .unwrap();

  let err = step(&["a"], &[], &[])
    .validate(&validation("second", &ctx, &registry))
    .await
    .unwrap_err();

  assert_eq!(
    err,
    ValidationError::DuplicateSchedule {
      kind: ResourceKind::Instance,
      name: resolved("a"),
      owner: "first".to_string(),
    }
  );
  assert_eq!(registry.instances().len(), 1);
}

#[tokio::test]
async fn test_validate_same_step_twice_fails() {
  let compute = compute_with(&[], &["d1"]);
  let ctx = context(compute);
  let registry = DeletionRegistry::new();
  let step = step(&[], &["d1"], &[]);

  step
    .validate(&validation("cleanup", &ctx, &registry))
    .await
    .unwrap();
  let err = step
    .validate(&validation("cleanup", &ctx, &registry))
    .await
    .unwrap_err();

  assert!(matches!(err, ValidationError::DuplicateSchedule { .. }));
  assert_eq!(registry.disks().len(), 1);
}

// --- execution ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_deletes_everything_once() {
  let compute = compute_with(&["a", "b", "c"], &["d1", "d2"]);
  compute.add_image("projects/p/global/images/img");
  let ctx = context(compute.clone());

  step(
    &["a", "b", "c"],
    &["d1", "d2"],
    &["projects/p/global/images/img"],
  )
  .run(&ctx)
  .await
  .unwrap();

  let mut instances = compute.invoked(Operation::DeleteInstance);
  instances.sort();
  assert_eq!(instances, vec![resolved("a"), resolved("b"), resolved("c")]);

  let mut disks = compute.invoked(Operation::DeleteDisk);
  disks.sort();
  assert_eq!(disks, vec![resolved("d1"), resolved("d2")]);

  assert_eq!(
    compute.invoked(Operation::DeleteImage),
    vec!["projects/p/global/images/img"]
  );
  assert!(!compute.has_instance(&resolved("a")));
  assert!(!compute.has_disk(&resolved("d2")));
  assert!(!compute.has_image("projects/p/global/images/img"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disks_deleted_after_instances() {
  let compute = compute_with(&["a", "b"], &["d1"]);
  compute.delay_on(
    Operation::DeleteInstance,
    resolved("b"),
    Duration::from_millis(40),
  );
  let ctx = context(compute.clone());

  step(&["a", "b"], &["d1"], &[]).run(&ctx).await.unwrap();

  let disk_started = compute
    .position(Operation::DeleteDisk, &resolved("d1"), false)
    .unwrap();
  for instance in ["a", "b"] {
    let finished = compute
      .position(Operation::DeleteInstance, &resolved(instance), true)
      .unwrap();
    assert!(finished < disk_started, "{} finished after disk delete began", instance);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_images_deleted_before_disks() {
  let compute = compute_with(&[], &["d1"]);
  compute.add_image("projects/p/global/images/img");
  compute.delay_on(
    Operation::DeleteImage,
    "projects/p/global/images/img",
    Duration::from_millis(30),
  );
  let ctx = context(compute.clone());

  step(&[], &["d1"], &["projects/p/global/images/img"])
    .run(&ctx)
    .await
    .unwrap();

  let image_finished = compute
    .position(Operation::DeleteImage, "projects/p/global/images/img", true)
    .unwrap();
  let disk_started = compute
    .position(Operation::DeleteDisk, &resolved("d1"), false)
    .unwrap();
  assert!(image_finished < disk_started);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_instance_failure_skips_disks() {
  let compute = compute_with(&["a"], &["d1"]);
  compute.fail_on(
    Operation::DeleteInstance,
    resolved("a"),
    ComputeError::not_found(ResourceKind::Instance, resolved("a")),
  );
  let ctx = context(compute.clone());

  let err = step(&["a"], &["d1"], &[]).run(&ctx).await.unwrap_err();

  match err {
    StepError::OperationFailed { kind, name, source } => {
      assert_eq!(kind, ResourceKind::Instance);
      assert_eq!(name, resolved("a"));
      assert_eq!(
        source,
        ComputeError::not_found(ResourceKind::Instance, resolved("a"))
      );
    }
    other => panic!("unexpected error: {}", other),
  }
  assert!(compute.invoked(Operation::DeleteDisk).is_empty());
  assert!(compute.has_disk(&resolved("d1")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_of_many_failures_skips_disks() {
  let instances = ["i0", "i1", "i2", "i3", "i4"];
  let compute = compute_with(&instances, &["d1", "d2"]);
  compute.fail_on(
    Operation::DeleteInstance,
    resolved("i3"),
    ComputeError::api(ResourceKind::Instance, resolved("i3"), "permission denied"),
  );
  let ctx = context(compute.clone());

  let err = step(&instances, &["d1", "d2"], &[])
    .run(&ctx)
    .await
    .unwrap_err();

  assert!(err.to_string().contains("permission denied"));
  assert!(compute.invoked(Operation::DeleteDisk).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_does_not_wait_for_stuck_sibling() {
  let compute = compute_with(&["a", "b"], &["d1"]);
  compute.hold(Operation::DeleteInstance, resolved("a"));
  compute.fail_on(
    Operation::DeleteInstance,
    resolved("b"),
    ComputeError::api(ResourceKind::Instance, resolved("b"), "internal error"),
  );
  let ctx = context(compute.clone());

  let err = tokio::time::timeout(
    Duration::from_secs(5),
    step(&["a", "b"], &["d1"], &[]).run(&ctx),
  )
  .await
  .expect("step blocked on a stuck sibling")
  .unwrap_err();

  assert!(matches!(
    err,
    StepError::OperationFailed { ref name, .. } if *name == resolved("b")
  ));
  assert!(compute.has_instance(&resolved("a")));
  assert!(compute.invoked(Operation::DeleteDisk).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disk_failure_is_step_result() {
  let compute = compute_with(&["a"], &["d1"]);
  compute.fail_on(
    Operation::DeleteDisk,
    resolved("d1"),
    ComputeError::api(ResourceKind::Disk, resolved("d1"), "disk in use"),
  );
  let ctx = context(compute.clone());

  let err = step(&["a"], &["d1"], &[]).run(&ctx).await.unwrap_err();

  assert!(matches!(
    err,
    StepError::OperationFailed { kind: ResourceKind::Disk, .. }
  ));
  assert!(!compute.has_instance(&resolved("a")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_during_phase_one_returns_ok() {
  let compute = compute_with(&["a", "b"], &["d1"]);
  compute.hold(Operation::DeleteInstance, resolved("b"));
  let ctx = context(compute.clone());

  let cancel = ctx.cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();
  });

  let result = tokio::time::timeout(
    Duration::from_secs(5),
    step(&["a", "b"], &["d1"], &[]).run(&ctx),
  )
  .await
  .expect("run did not return after cancellation");

  result.unwrap();
  assert!(compute.invoked(Operation::DeleteDisk).is_empty());
  assert!(compute.has_disk(&resolved("d1")));
}

#[tokio::test]
async fn test_cancelled_before_run_returns_ok() {
  let compute = compute_with(&["a"], &["d1"]);
  let ctx = context(compute.clone());
  ctx.cancel.cancel();

  step(&["a"], &["d1"], &[]).run(&ctx).await.unwrap();

  assert!(compute.invoked(Operation::DeleteDisk).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_during_phase_two_returns_ok() {
  let compute = compute_with(&["a"], &["d1"]);
  compute.hold(Operation::DeleteDisk, resolved("d1"));
  let ctx = context(compute.clone());

  let cancel = ctx.cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();
  });

  step(&["a"], &["d1"], &[]).run(&ctx).await.unwrap();

  assert!(!compute.has_instance(&resolved("a")));
  assert_eq!(compute.invoked(Operation::DeleteDisk), vec![resolved("d1")]);
}

#[tokio::test]
async fn test_empty_step_succeeds() {
  let ctx = context(Arc::new(InMemoryCompute::new()));
  step(&[], &[], &[]).run(&ctx).await.unwrap();
}
