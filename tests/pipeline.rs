// 该文件是 Wangshan （望山） 项目的一部分。
// tests/pipeline.rs - 检测流水线端到端测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::cell::RefCell;

use image::{Rgb, RgbImage};

use wangshan::detector::{Detector, DetectorError};
use wangshan::model::{Backend, Detection, ModelConfig, Session};
use wangshan::output::Render;
use wangshan::postprocess::OutputLayout;
use wangshan::task::{OneShotTask, Task};
use wangshan::tensor::Tensor;

/// 返回固定输出张量的假后端
struct FakeBackend {
  output: Tensor,
}

impl Backend for FakeBackend {
  type Error = std::convert::Infallible;

  fn run(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    assert_eq!(input.shape(), &[1, 3, 640, 640]);
    Ok(self.output.clone())
  }

  fn provider(&self) -> &str {
    "fake"
  }
}

/// 推理必定失败的后端
struct FailingBackend;

impl Backend for FailingBackend {
  type Error = std::io::Error;

  fn run(&self, _input: &Tensor) -> Result<Tensor, Self::Error> {
    Err(std::io::Error::other("推理失败"))
  }

  fn provider(&self) -> &str {
    "fake"
  }
}

/// 收集渲染结果的假输出
#[derive(Default)]
struct CollectOutput {
  rendered: RefCell<Vec<Detection>>,
}

impl Render<RgbImage, Vec<Detection>> for &CollectOutput {
  type Error = std::convert::Infallible;

  fn render_result(&self, _frame: &RgbImage, result: &Vec<Detection>) -> Result<(), Self::Error> {
    self.rendered.borrow_mut().extend(result.iter().cloned());
    Ok(())
  }
}

fn square_config(output_shape: Vec<usize>) -> (ModelConfig, OutputLayout) {
  let config = ModelConfig {
    path: "fake.onnx".to_string(),
    input_shape: vec![1, 3, 640, 640],
    output_shape,
  };
  let layout = OutputLayout::from_shape(&config.output_shape).unwrap();
  (config, layout)
}

/// 列布局张量: [1, 5, 2]，两个候选，单类别
fn two_proposal_tensor(centers: [(f32, f32); 2], scores: [f32; 2]) -> Tensor {
  let data = vec![
    centers[0].0,
    centers[1].0, // cx
    centers[0].1,
    centers[1].1, // cy
    50.0,
    50.0, // w
    50.0,
    50.0, // h
    scores[0],
    scores[1],
  ];
  Tensor::new(data, vec![1, 5, 2])
}

#[test]
fn overlapping_proposals_collapse_to_one_detection() {
  // 两个高重叠候选, IOU > 0.5, 只保留高分框
  let backend = FakeBackend {
    output: two_proposal_tensor([(100.0, 100.0), (105.0, 105.0)], [0.9, 0.7]),
  };
  let (config, layout) = square_config(vec![1, 5, 2]);
  let detector = Detector::new(&backend, &config, layout, 0.5);

  let image = RgbImage::from_pixel(640, 640, Rgb([127, 127, 127]));
  let (detections, stats) = detector.detect(&image).unwrap();

  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].class_id, 0);
  assert_eq!(detections[0].score, 0.9);
  assert_eq!(detections[0].bbox, [75.0, 75.0, 50.0, 50.0]);
  assert_eq!(stats.detected_objects, 1);
  assert_eq!(stats.provider, "fake");
}

#[test]
fn disjoint_proposals_both_survive_in_score_order() {
  let backend = FakeBackend {
    output: two_proposal_tensor([(100.0, 100.0), (400.0, 400.0)], [0.9, 0.7]),
  };
  let (config, layout) = square_config(vec![1, 5, 2]);
  let detector = Detector::new(&backend, &config, layout, 0.5);

  let image = RgbImage::from_pixel(640, 640, Rgb([127, 127, 127]));
  let (detections, stats) = detector.detect(&image).unwrap();

  assert_eq!(detections.len(), 2);
  assert_eq!(detections[0].score, 0.9);
  assert_eq!(detections[1].score, 0.7);
  assert_eq!(detections[1].bbox, [375.0, 375.0, 50.0, 50.0]);
  assert!((stats.avg_confidence - 80.0).abs() < 1e-3);
}

#[test]
fn letterbox_is_inverted_for_non_square_images() {
  // 320x240 图像信箱缩放到 640x640: ratio=2, pad_y=80
  // 模型空间中心 (160, 200) 尺寸 (40, 40) 对应原图 [70, 50, 20, 20]
  let data = vec![160.0, 200.0, 40.0, 40.0, 0.9];
  let backend = FakeBackend {
    output: Tensor::new(data, vec![1, 5, 1]),
  };
  let (config, layout) = square_config(vec![1, 5, 1]);
  let detector = Detector::new(&backend, &config, layout, 0.5);

  let image = RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]));
  let (detections, _) = detector.detect(&image).unwrap();

  assert_eq!(detections.len(), 1);
  let [x, y, w, h] = detections[0].bbox;
  assert!((x - 70.0).abs() < 1e-3);
  assert!((y - 50.0).abs() < 1e-3);
  assert!((w - 20.0).abs() < 1e-3);
  assert!((h - 20.0).abs() < 1e-3);
}

#[test]
fn mismatched_output_degrades_to_empty_result() {
  // 配置声称 8400 个候选，后端只给出 2 个，降级为空结果而非报错
  let backend = FakeBackend {
    output: two_proposal_tensor([(100.0, 100.0), (400.0, 400.0)], [0.9, 0.7]),
  };
  let (config, layout) = square_config(vec![1, 5, 8400]);
  let detector = Detector::new(&backend, &config, layout, 0.5);

  let image = RgbImage::from_pixel(640, 640, Rgb([0, 0, 0]));
  let (detections, stats) = detector.detect(&image).unwrap();

  assert!(detections.is_empty());
  assert_eq!(stats.detected_objects, 0);
  assert_eq!(stats.avg_confidence, 0.0);
}

#[test]
fn backend_failure_propagates() {
  let backend = FailingBackend;
  let (config, layout) = square_config(vec![1, 5, 2]);
  let detector = Detector::new(&backend, &config, layout, 0.5);

  let image = RgbImage::from_pixel(640, 640, Rgb([0, 0, 0]));
  let result = detector.detect(&image);
  assert!(matches!(result, Err(DetectorError::Backend(_))));
}

#[test]
fn one_shot_task_wires_input_detector_and_output() {
  let backend = FakeBackend {
    output: two_proposal_tensor([(100.0, 100.0), (400.0, 400.0)], [0.9, 0.7]),
  };
  let (config, layout) = square_config(vec![1, 5, 2]);
  let detector = Detector::new(&backend, &config, layout, 0.5);

  let image = RgbImage::from_pixel(640, 640, Rgb([127, 127, 127]));
  let collect = CollectOutput::default();

  let stats = OneShotTask
    .run_task(std::iter::once(image), &detector, &collect)
    .unwrap();

  assert_eq!(stats.detected_objects, 2);
  assert_eq!(collect.rendered.borrow().len(), 2);
}

#[test]
fn session_state_machine_guards_the_backend() {
  let mut session: Session<FakeBackend> = Session::Unloaded;
  assert!(session.backend().is_none());

  session.load(|| {
    Ok::<_, std::convert::Infallible>(FakeBackend {
      output: Tensor::zeros(vec![1, 5, 2]),
    })
  });
  assert!(session.is_ready());
  assert!(session.backend().is_some());
}
