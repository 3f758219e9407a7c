use super::*;

fn controller() -> UploadWorkflowController {
    UploadWorkflowController::new(Arc::new(HttpImportGateway::new("http://127.0.0.1:9")))
}

#[tokio::test]
async fn refused_file_is_not_announced() {
    let mut controller = controller();

    let result = start_import(&mut controller, PackageFile::new("notes.txt", vec![0u8; 10]));

    assert!(matches!(result, Err(WorkflowError::InvalidPackage { .. })));
    assert!(!controller.is_uploading());
    assert!(controller.state().error_message.is_some());
}

#[tokio::test]
async fn started_upload_is_announced_with_name_and_size() {
    let mut controller = controller();

    let banner = start_import(&mut controller, PackageFile::new("mydeck.apkg", vec![0u8; 2048]))
        .expect("upload starts");

    assert_eq!(banner, "Uploading mydeck.apkg (2 KB)");
    assert!(controller.is_uploading());
}
